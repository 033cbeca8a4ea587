use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::{CampaignCounter, CampaignStatus, LeadStatus, OutreachStatus};
use crate::notifications::notify_quietly;
use crate::outreach::{EmailAttachment, OutgoingEmail};

pub async fn run_outreach(
    deps: &PipelineDeps,
    _now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let queued = deps.store.outreach_with_status(OutreachStatus::Queued).await?;
    let mut summary = StageSummary::default();
    let mut started_campaigns = BTreeSet::new();
    let total = queued.len();

    for (index, mut outreach) in queued.into_iter().enumerate() {
        summary.processed += 1;
        if started_campaigns.insert(outreach.campaign_id) {
            mark_running(deps, outreach.campaign_id).await?;
        }

        let email = OutgoingEmail {
            to: outreach.to_email.clone(),
            subject: outreach.subject.clone(),
            html: outreach.body_html.clone(),
            attachments: outreach
                .attachment_paths
                .iter()
                .map(EmailAttachment::from_path)
                .collect(),
        };

        match deps.mailer.send(&email).await {
            Ok(message_id) => {
                let sent_at = Utc::now();
                outreach.status = OutreachStatus::Sent;
                outreach.sent_at = Some(sent_at);
                outreach.provider_message_id = Some(message_id);
                deps.store.update_outreach(&outreach).await?;

                if let Some(mut lead) = deps.store.lead(outreach.lead_id).await? {
                    if lead.status == LeadStatus::QueuedForSend {
                        lead.status = LeadStatus::EmailSent;
                    }
                    lead.email_sent_at.get_or_insert(sent_at);
                    deps.store.update_lead(&lead).await?;
                }
                deps.store
                    .increment_campaign(outreach.campaign_id, CampaignCounter::EmailsSent)
                    .await?;
                remove_attachments(&outreach.attachment_paths).await;

                debug!(outreach_id = %outreach.id, to = %outreach.to_email, "outreach sent");
                summary.advanced += 1;
            }
            Err(err) => {
                warn!(outreach_id = %outreach.id, error = %err, "outreach send failed");
                outreach.status = OutreachStatus::Failed;
                deps.store.update_outreach(&outreach).await?;
                summary.failed += 1;
            }
        }

        if index + 1 < total && !deps.settings.send_interval.is_zero() {
            tokio::time::sleep(deps.settings.send_interval).await;
        }
    }

    for campaign_id in started_campaigns {
        mark_completed(deps, campaign_id).await?;
    }

    if summary.advanced > 0 {
        notify_quietly(
            deps.notifier.as_ref(),
            &format!(
                "Outreach completed: {} e-mails sent, {} failed",
                summary.advanced, summary.failed
            ),
        )
        .await;
    }

    Ok(summary)
}

async fn mark_running(deps: &PipelineDeps, campaign_id: Uuid) -> Result<(), StageError> {
    let Some(mut campaign) = deps.store.campaign(campaign_id).await? else {
        return Ok(());
    };
    campaign.status = CampaignStatus::Running;
    campaign.started_at.get_or_insert_with(Utc::now);
    deps.store.update_campaign(&campaign).await?;
    info!(campaign = %campaign.name, "campaign running");
    Ok(())
}

async fn mark_completed(deps: &PipelineDeps, campaign_id: Uuid) -> Result<(), StageError> {
    let Some(mut campaign) = deps.store.campaign(campaign_id).await? else {
        return Ok(());
    };
    campaign.status = CampaignStatus::Completed;
    campaign.completed_at = Some(Utc::now());
    deps.store.update_campaign(&campaign).await?;
    info!(campaign = %campaign.name, sent = campaign.emails_sent, "campaign completed");
    Ok(())
}

async fn remove_attachments(paths: &[String]) {
    for path in paths {
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(%path, error = %err, "failed to remove sent attachment");
            }
        }
    }
}
