use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::domain::{
    Campaign, CampaignCounter, DailyReport, DayWindow, EmailEvent, Lead, LeadStatus, NewEmailEvent,
    NewLead, NewOutreach, Outreach, OutreachStatus, SearchHistoryEntry,
};
use crate::tracking::{DeliveryUpdate, EngagementHit, EngagementOutcome};

/// Storage abstraction so the pipeline stages can be exercised in isolation.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn health_check(&self) -> Result<(), RepositoryError>;
    /// Names of required tables that are missing from the backing store.
    async fn missing_tables(&self) -> Result<Vec<String>, RepositoryError>;

    async fn recent_searches(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchHistoryEntry>, RepositoryError>;
    async fn record_search(&self, city: &str, category: &str) -> Result<(), RepositoryError>;

    async fn place_id_exists(&self, place_id: &str) -> Result<bool, RepositoryError>;
    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError>;
    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, RepositoryError>;
    async fn lead(&self, id: Uuid) -> Result<Option<Lead>, RepositoryError>;
    async fn leads_with_status(&self, status: LeadStatus) -> Result<Vec<Lead>, RepositoryError>;
    async fn update_lead(&self, lead: &Lead) -> Result<(), RepositoryError>;
    /// Most recently created lead carrying this e-mail address.
    async fn latest_lead_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError>;

    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, RepositoryError>;
    async fn campaign_for_date(&self, date: NaiveDate)
        -> Result<Option<Campaign>, RepositoryError>;
    async fn insert_campaign(&self, campaign: Campaign) -> Result<Campaign, RepositoryError>;
    async fn update_campaign(&self, campaign: &Campaign) -> Result<(), RepositoryError>;
    async fn increment_campaign(
        &self,
        id: Uuid,
        counter: CampaignCounter,
    ) -> Result<(), RepositoryError>;

    async fn insert_outreach(&self, outreach: NewOutreach) -> Result<Outreach, RepositoryError>;
    async fn outreach_with_status(
        &self,
        status: OutreachStatus,
    ) -> Result<Vec<Outreach>, RepositoryError>;
    async fn outreach_by_token(&self, token: &str) -> Result<Option<Outreach>, RepositoryError>;
    async fn latest_outreach_for_lead(
        &self,
        lead_id: Uuid,
    ) -> Result<Option<Outreach>, RepositoryError>;
    async fn update_outreach(&self, outreach: &Outreach) -> Result<(), RepositoryError>;

    /// Applies the engagement cascade and logs the event atomically.
    /// Unknown tokens yield `Ok(None)` without side effects.
    async fn record_engagement(
        &self,
        token: &str,
        hit: EngagementHit,
    ) -> Result<Option<EngagementOutcome>, RepositoryError>;
    async fn record_event(&self, event: NewEmailEvent) -> Result<EmailEvent, RepositoryError>;
    /// Returns the number of outreach rows the update changed.
    async fn apply_delivery_update(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<u64, RepositoryError>;

    async fn day_metrics(&self, window: DayWindow) -> Result<DayMetrics, RepositoryError>;
    /// Leads discovered inside the window plus every lead already engaged.
    async fn report_leads(&self, window: DayWindow) -> Result<Vec<Lead>, RepositoryError>;
    async fn save_daily_report(&self, report: &DailyReport) -> Result<(), RepositoryError>;
}

/// Funnel counts for one local day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayMetrics {
    pub leads_discovered: i64,
    pub leads_qualified: i64,
    pub emails_sent: i64,
    pub emails_opened: i64,
    pub links_clicked: i64,
    pub replies_received: i64,
}

pub const REQUIRED_TABLES: &[&str] = &["leads", "search_history"];

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored record is malformed: {0}")]
    Corrupt(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Corrupt(value.to_string())
            }
            _ => Self::Unavailable(value.to_string()),
        }
    }
}

impl From<super::domain::UnknownStatus> for RepositoryError {
    fn from(value: super::domain::UnknownStatus) -> Self {
        Self::Corrupt(value.to_string())
    }
}
