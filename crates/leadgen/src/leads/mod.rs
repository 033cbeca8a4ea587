//! Lead, campaign and outreach records plus the storage seam the pipeline runs against.

pub mod domain;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use domain::{
    Campaign, CampaignCounter, CampaignStatus, DailyReport, DayWindow, EmailEvent, EventKind, Lead,
    LeadStatus, NewEmailEvent, NewLead, NewOutreach, Outreach, OutreachStatus, SearchHistoryEntry,
    UnknownStatus,
};
pub use memory::InMemoryLeadStore;
pub use postgres::PgLeadStore;
pub use repository::{DayMetrics, LeadStore, RepositoryError, REQUIRED_TABLES};
