//! Local-business lead generation: discovery, qualification, personalized
//! outreach, engagement tracking, reply polling and daily reporting.

pub mod config;
pub mod discovery;
pub mod error;
pub mod leads;
pub mod notifications;
pub mod outreach;
pub mod personalization;
pub mod pipeline;
pub mod qualification;
pub mod replies;
pub mod reporting;
pub mod scheduler;
pub mod telemetry;
pub mod tracking;
