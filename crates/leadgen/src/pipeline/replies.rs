use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::{CampaignCounter, EventKind, LeadStatus, NewEmailEvent};
use crate::notifications::notify_quietly;

pub async fn run_reply_poll(
    deps: &PipelineDeps,
    now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let replies = deps.inbox.fetch_unseen().await?;
    let mut summary = StageSummary::default();

    for reply in replies {
        summary.processed += 1;
        let Some(mut lead) = deps.store.latest_lead_by_email(&reply.from_email).await? else {
            debug!(from = %reply.from_email, "reply from unknown sender");
            summary.skipped += 1;
            continue;
        };
        if lead.status == LeadStatus::Replied {
            summary.skipped += 1;
            continue;
        }

        lead.status = LeadStatus::Replied;
        lead.first_replied_at.get_or_insert(now);
        deps.store.update_lead(&lead).await?;

        let outreach = deps.store.latest_outreach_for_lead(lead.id).await?;
        deps.store
            .record_event(NewEmailEvent {
                lead_id: lead.id,
                outreach_id: outreach.as_ref().map(|row| row.id),
                tracking_token: outreach.as_ref().map(|row| row.tracking_token.clone()),
                event_type: EventKind::Reply,
                url_clicked: None,
                ip_address: None,
                user_agent: None,
            })
            .await?;
        if let Some(outreach) = &outreach {
            deps.store
                .increment_campaign(outreach.campaign_id, CampaignCounter::RepliesReceived)
                .await?;
        }

        info!(
            lead_id = %lead.id,
            business = %lead.business_name,
            sent_at = ?reply.received_at,
            "reply detected"
        );
        notify_quietly(
            deps.notifier.as_ref(),
            &format!(
                "Reply detected!\nLead: {}\nEmail: {}\nSubject: {}",
                lead.business_name,
                reply.from_email,
                if reply.subject.is_empty() {
                    "(no subject)"
                } else {
                    reply.subject.as_str()
                }
            ),
        )
        .await;
        summary.advanced += 1;
    }

    Ok(summary)
}
