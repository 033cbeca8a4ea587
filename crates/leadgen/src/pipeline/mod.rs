//! Daily batch stages and the runner that serialises them.
//!
//! Every stage is a single pass over the rows in one status. Dependencies are
//! trait objects so the whole funnel can run against in-process doubles.

pub mod discovery;
pub mod outreach;
pub mod personalization;
pub mod qualification;
pub mod replies;
pub mod report;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::discovery::PlaceSearch;
use crate::leads::{LeadStore, RepositoryError};
use crate::notifications::{notify_quietly, Notifier};
use crate::outreach::{Mailer, MailerError};
use crate::personalization::{LanguageModel, ProposalError};
use crate::qualification::SiteInspector;
use crate::replies::{InboxError, InboxPoller};
use crate::reporting::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Discovery,
    Qualification,
    Personalization,
    Outreach,
    ReplyPoll,
    DailyReport,
}

impl PipelineStage {
    /// Order of a full manual run; reply polling runs on its own interval.
    pub const DAILY_SEQUENCE: [PipelineStage; 5] = [
        PipelineStage::Discovery,
        PipelineStage::Qualification,
        PipelineStage::Personalization,
        PipelineStage::Outreach,
        PipelineStage::DailyReport,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PipelineStage::Discovery => "discovery",
            PipelineStage::Qualification => "qualification",
            PipelineStage::Personalization => "personalization",
            PipelineStage::Outreach => "outreach",
            PipelineStage::ReplyPoll => "reply_poll",
            PipelineStage::DailyReport => "daily_report",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            PipelineStage::Discovery => "Discovery",
            PipelineStage::Qualification => "Qualification",
            PipelineStage::Personalization => "Personalization",
            PipelineStage::Outreach => "Outreach",
            PipelineStage::ReplyPoll => "Reply Polling",
            PipelineStage::DailyReport => "Daily Report",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline stage '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for PipelineStage {
    type Err = UnknownStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "discovery" => Ok(Self::Discovery),
            "qualification" => Ok(Self::Qualification),
            "personalization" => Ok(Self::Personalization),
            "outreach" => Ok(Self::Outreach),
            "reply_poll" | "replies" => Ok(Self::ReplyPoll),
            "daily_report" | "report" => Ok(Self::DailyReport),
            _ => Err(UnknownStage(value.to_string())),
        }
    }
}

/// Counts reported by one stage pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    /// Rows or messages looked at.
    pub processed: usize,
    /// Rows moved to the stage's success state.
    pub advanced: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Proposal(#[from] ProposalError),
    #[error(transparent)]
    Inbox(#[from] InboxError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Mailer(#[from] MailerError),
}

/// Non-client settings the stages need.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub region: String,
    pub timezone: Tz,
    pub public_url: String,
    pub call_to_action_url: Option<String>,
    pub reply_address: String,
    pub send_interval: Duration,
    pub artifacts_dir: PathBuf,
    pub admin_email: Option<String>,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            region: config.llm.region.clone(),
            timezone: config.schedule.timezone,
            public_url: config.outreach.public_url.clone(),
            call_to_action_url: config.outreach.call_to_action_url.clone(),
            reply_address: config
                .smtp
                .reply_to
                .clone()
                .unwrap_or_else(|| config.smtp.from_email.clone()),
            send_interval: config.outreach.send_interval,
            artifacts_dir: config.outreach.artifacts_dir.clone(),
            admin_email: config.notifications.admin_email.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PipelineDeps {
    pub store: Arc<dyn LeadStore>,
    pub places: Arc<dyn PlaceSearch>,
    pub inspector: Arc<dyn SiteInspector>,
    pub model: Arc<dyn LanguageModel>,
    pub mailer: Arc<dyn Mailer>,
    pub inbox: Arc<dyn InboxPoller>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: PipelineSettings,
}

/// Runs stages one at a time, logging and alerting on failure.
pub struct PipelineRunner {
    deps: PipelineDeps,
    gate: Mutex<()>,
}

impl PipelineRunner {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            deps,
            gate: Mutex::new(()),
        }
    }

    pub fn deps(&self) -> &PipelineDeps {
        &self.deps
    }

    pub async fn run_stage(&self, stage: PipelineStage) -> Result<StageSummary, StageError> {
        let _running = self.gate.lock().await;
        self.execute(stage, Utc::now()).await
    }

    /// Runs a triggered stage unless the trigger fired more than `grace`
    /// after `scheduled_at`, in which case `Ok(None)` is returned. Time spent
    /// queued behind another run does not count as lateness.
    pub async fn run_scheduled(
        &self,
        stage: PipelineStage,
        scheduled_at: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Option<StageSummary>, StageError> {
        if is_misfire(scheduled_at, Utc::now(), grace) {
            warn!(
                stage = stage.label(),
                %scheduled_at,
                "trigger missed its grace period, skipping"
            );
            return Ok(None);
        }
        let _running = self.gate.lock().await;
        self.execute(stage, Utc::now()).await.map(Some)
    }

    /// Discovery through daily report, stopping at the first failing stage.
    pub async fn run_full_pipeline(
        &self,
    ) -> Result<Vec<(PipelineStage, StageSummary)>, StageError> {
        let _running = self.gate.lock().await;
        let mut summaries = Vec::with_capacity(PipelineStage::DAILY_SEQUENCE.len());
        for stage in PipelineStage::DAILY_SEQUENCE {
            let summary = self.execute(stage, Utc::now()).await?;
            summaries.push((stage, summary));
        }
        Ok(summaries)
    }

    async fn execute(
        &self,
        stage: PipelineStage,
        now: DateTime<Utc>,
    ) -> Result<StageSummary, StageError> {
        info!(stage = stage.label(), "stage started");
        let started = Instant::now();

        let result = match stage {
            PipelineStage::Discovery => discovery::run_discovery(&self.deps, now).await,
            PipelineStage::Qualification => {
                qualification::run_qualification(&self.deps, now).await
            }
            PipelineStage::Personalization => {
                personalization::run_personalization(&self.deps, now).await
            }
            PipelineStage::Outreach => outreach::run_outreach(&self.deps, now).await,
            PipelineStage::ReplyPoll => replies::run_reply_poll(&self.deps, now).await,
            PipelineStage::DailyReport => report::run_daily_report(&self.deps, now).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(summary) => info!(
                stage = stage.label(),
                processed = summary.processed,
                advanced = summary.advanced,
                skipped = summary.skipped,
                failed = summary.failed,
                elapsed_ms,
                "stage finished"
            ),
            Err(err) => {
                error!(stage = stage.label(), error = %err, elapsed_ms, "stage failed");
                notify_quietly(
                    self.deps.notifier.as_ref(),
                    &format!("Pipeline Error ({}): {err}", stage.title()),
                )
                .await;
            }
        }
        result
    }
}

/// True when a trigger scheduled at `scheduled_at` is starting too late at `now`.
pub fn is_misfire(scheduled_at: DateTime<Utc>, now: DateTime<Utc>, grace: Duration) -> bool {
    match (now - scheduled_at).to_std() {
        Ok(lateness) => lateness > grace,
        Err(_) => false,
    }
}
