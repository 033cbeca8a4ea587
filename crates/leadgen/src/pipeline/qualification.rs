use chrono::{DateTime, Utc};
use tracing::debug;

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::LeadStatus;
use crate::notifications::notify_quietly;
use crate::qualification::score_presence;

pub async fn run_qualification(
    deps: &PipelineDeps,
    now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let leads = deps.store.leads_with_status(LeadStatus::Discovered).await?;
    let mut summary = StageSummary::default();

    for mut lead in leads {
        summary.processed += 1;
        let report = deps.inspector.probe(lead.website_url.as_deref()).await;
        let outcome = score_presence(&lead, &report);

        lead.qualification_score = outcome.total_score;
        lead.web_presence_notes = Some(outcome.notes());
        lead.has_website = outcome.has_website;
        lead.has_social_media = outcome.has_social_media;
        if outcome.qualifies(lead.email.is_some()) {
            lead.status = LeadStatus::Qualified;
            lead.qualified_at = Some(now);
            summary.advanced += 1;
        } else {
            lead.status = LeadStatus::Rejected;
        }
        debug!(
            lead_id = %lead.id,
            score = outcome.total_score,
            status = %lead.status,
            "lead scored"
        );
        deps.store.update_lead(&lead).await?;
    }

    if summary.advanced > 0 {
        notify_quietly(
            deps.notifier.as_ref(),
            &format!(
                "Qualification completed: {} leads approved for outreach",
                summary.advanced
            ),
        )
        .await;
    }

    Ok(summary)
}
