use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::{
    Campaign, CampaignCounter, LeadStatus, LeadStore, NewOutreach, RepositoryError,
};
use crate::notifications::notify_quietly;
use crate::personalization::{render_outreach_html, write_email_draft, write_proposal, EmailContext};
use crate::tracking::TrackingToken;

/// Today's campaign, created on first use.
pub async fn ensure_campaign(
    store: &dyn LeadStore,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Campaign, RepositoryError> {
    if let Some(campaign) = store.campaign_for_date(date).await? {
        return Ok(campaign);
    }
    match store
        .insert_campaign(Campaign::new(Campaign::daily_name(date), date, now))
        .await
    {
        Ok(campaign) => Ok(campaign),
        Err(RepositoryError::Conflict) => store
            .campaign_for_date(date)
            .await?
            .ok_or(RepositoryError::NotFound),
        Err(err) => Err(err),
    }
}

pub async fn run_personalization(
    deps: &PipelineDeps,
    now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let settings = &deps.settings;
    let today = now.with_timezone(&settings.timezone).date_naive();
    let campaign = ensure_campaign(deps.store.as_ref(), today, now).await?;
    let leads = deps.store.leads_with_status(LeadStatus::Qualified).await?;
    let mut summary = StageSummary::default();

    for mut lead in leads {
        summary.processed += 1;
        let Some(to_email) = lead.email.clone() else {
            warn!(lead_id = %lead.id, "qualified lead has no e-mail, skipping");
            summary.skipped += 1;
            continue;
        };

        let draft = write_email_draft(deps.model.as_ref(), &lead).await;
        let proposal = write_proposal(&settings.artifacts_dir, &lead, &draft, today).await?;
        let token = TrackingToken::issue(lead.id, campaign.id);
        let body_html = render_outreach_html(&EmailContext {
            business_name: &lead.business_name,
            body_html: &draft.body_html,
            token: &token,
            public_url: &settings.public_url,
            call_to_action_url: settings.call_to_action_url.as_deref(),
            reply_to: Some(&settings.reply_address),
        });

        let outreach = deps
            .store
            .insert_outreach(NewOutreach {
                lead_id: lead.id,
                campaign_id: campaign.id,
                to_email,
                subject: draft.subject,
                body_html,
                tracking_token: token.into_string(),
                ai_generated: draft.ai_generated,
                attachment_paths: vec![proposal.to_string_lossy().into_owned()],
            })
            .await?;
        deps.store
            .increment_campaign(campaign.id, CampaignCounter::TotalLeads)
            .await?;

        lead.status = LeadStatus::QueuedForSend;
        deps.store.update_lead(&lead).await?;
        debug!(lead_id = %lead.id, outreach_id = %outreach.id, "outreach queued");
        summary.advanced += 1;
    }

    if summary.advanced > 0 {
        notify_quietly(
            deps.notifier.as_ref(),
            &format!(
                "Personalization completed: {} proposals queued for sending",
                summary.advanced
            ),
        )
        .await;
    }

    Ok(summary)
}
