//! Cron-style triggers for the daily stages and the reply poll interval.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ScheduleConfig;
use crate::pipeline::{PipelineRunner, PipelineStage};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid trigger for {stage}: {source}")]
    InvalidTrigger {
        stage: PipelineStage,
        #[source]
        source: cron::error::Error,
    },
}

/// One daily stage and when it fires.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    pub stage: PipelineStage,
    schedule: Schedule,
}

impl DailyTrigger {
    pub fn at(stage: PipelineStage, hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        let expression = format!("0 {minute} {hour} * * *");
        let schedule = Schedule::from_str(&expression)
            .map_err(|source| SchedulerError::InvalidTrigger { stage, source })?;
        Ok(Self { stage, schedule })
    }

    /// Next firing strictly after `after`, evaluated in `tz`.
    pub fn next_after(&self, after: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(tz))
            .next()
            .map(|fire| fire.with_timezone(&Utc))
    }
}

pub fn daily_triggers(config: &ScheduleConfig) -> Result<Vec<DailyTrigger>, SchedulerError> {
    Ok(vec![
        DailyTrigger::at(PipelineStage::Discovery, config.discovery_hour, 0)?,
        DailyTrigger::at(PipelineStage::Qualification, config.qualification_hour, 0)?,
        DailyTrigger::at(PipelineStage::Personalization, config.personalization_hour, 0)?,
        DailyTrigger::at(PipelineStage::Outreach, config.outreach_hour, 0)?,
        DailyTrigger::at(
            PipelineStage::DailyReport,
            config.report_hour,
            config.report_minute,
        )?,
    ])
}

/// Background tasks driving the pipeline; aborted on drop.
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        runner: Arc<PipelineRunner>,
        config: &ScheduleConfig,
    ) -> Result<Self, SchedulerError> {
        let triggers = daily_triggers(config)?;
        let mut handles = Vec::with_capacity(triggers.len() + 1);

        for trigger in triggers {
            handles.push(tokio::spawn(run_daily(
                runner.clone(),
                trigger,
                config.timezone,
                config.misfire_grace,
            )));
        }

        let period = Duration::from_secs(config.reply_poll_minutes.max(1) * 60);
        handles.push(tokio::spawn(run_reply_poll(runner, period)));

        info!(
            timezone = %config.timezone,
            discovery = config.discovery_hour,
            qualification = config.qualification_hour,
            personalization = config.personalization_hour,
            outreach = config.outreach_hour,
            report = %format!("{:02}:{:02}", config.report_hour, config.report_minute),
            reply_poll_minutes = config.reply_poll_minutes,
            "scheduler started"
        );
        Ok(Self { handles })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn run_daily(
    runner: Arc<PipelineRunner>,
    trigger: DailyTrigger,
    tz: Tz,
    grace: Duration,
) {
    let mut cursor = Utc::now();
    loop {
        let Some(fire_at) = trigger.next_after(cursor, &tz) else {
            warn!(stage = trigger.stage.label(), "trigger has no future firing");
            return;
        };
        debug!(stage = trigger.stage.label(), %fire_at, "next trigger scheduled");
        let wait = (fire_at - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        // Stage errors are already logged and alerted by the runner.
        let _ = runner.run_scheduled(trigger.stage, fire_at, grace).await;
        cursor = fire_at;
    }
}

async fn run_reply_poll(runner: Arc<PipelineRunner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let _ = runner.run_stage(PipelineStage::ReplyPoll).await;
    }
}
