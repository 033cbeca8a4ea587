use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::{DailyReport, DayMetrics, DayWindow};
use crate::outreach::{EmailAttachment, OutgoingEmail};
use crate::reporting::{render_report_html, report_subject, write_report_files};

fn clamp(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

pub async fn run_daily_report(
    deps: &PipelineDeps,
    now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let window = DayWindow::local_day(now, &deps.settings.timezone);
    let mut summary = StageSummary::default();

    if deps.store.campaign_for_date(window.date).await?.is_none() {
        info!(date = %window.date, "no campaign for report day, skipping report");
        summary.skipped = 1;
        return Ok(summary);
    }

    let metrics: DayMetrics = deps.store.day_metrics(window).await?;
    let leads = deps.store.report_leads(window).await?;
    summary.processed = leads.len();

    let reports_dir = deps.settings.artifacts_dir.join("reports");
    let files = write_report_files(&reports_dir, window.date, &metrics, &leads).await?;

    let mut email_sent_to = None;
    let mut error_log = None;
    match &deps.settings.admin_email {
        Some(admin) => {
            let email = OutgoingEmail {
                to: admin.clone(),
                subject: report_subject(window.date, &metrics),
                html: render_report_html(window.date, &metrics),
                attachments: files
                    .paths()
                    .into_iter()
                    .map(EmailAttachment::from_path)
                    .collect(),
            };
            match deps.mailer.send(&email).await {
                Ok(_) => email_sent_to = Some(admin.clone()),
                Err(err) => {
                    warn!(error = %err, "failed to mail daily report");
                    error_log = Some(format!("report e-mail failed: {err}"));
                }
            }
        }
        None => warn!("ADMIN_EMAIL not configured, daily report not mailed"),
    }

    deps.store
        .save_daily_report(&DailyReport {
            report_date: window.date,
            leads_discovered: clamp(metrics.leads_discovered),
            leads_qualified: clamp(metrics.leads_qualified),
            emails_sent: clamp(metrics.emails_sent),
            emails_opened: clamp(metrics.emails_opened),
            links_clicked: clamp(metrics.links_clicked),
            replies_received: clamp(metrics.replies_received),
            new_conversions: 0,
            report_file_path: Some(files.leads.to_string_lossy().into_owned()),
            email_sent_to,
            pipeline_started_at: Some(now),
            pipeline_ended_at: Some(Utc::now()),
            pipeline_status: "completed".to_string(),
            error_log,
        })
        .await?;

    info!(date = %window.date, sent = metrics.emails_sent, clicks = metrics.links_clicked, "daily report saved");
    summary.advanced = 1;
    Ok(summary)
}
