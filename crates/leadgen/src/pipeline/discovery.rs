use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{PipelineDeps, StageError, StageSummary};
use crate::leads::RepositoryError;
use crate::notifications::notify_quietly;
use crate::personalization::choose_daily_targets;

/// Cities and categories searched within this many days are not picked again.
pub const SEARCH_HISTORY_DAYS: i64 = 60;

pub async fn run_discovery(
    deps: &PipelineDeps,
    now: DateTime<Utc>,
) -> Result<StageSummary, StageError> {
    let history = deps
        .store
        .recent_searches(now - Duration::days(SEARCH_HISTORY_DAYS))
        .await?;
    let excluded_cities: Vec<String> = history
        .iter()
        .map(|entry| entry.city.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let excluded_categories: Vec<String> = history
        .iter()
        .map(|entry| entry.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let targets = choose_daily_targets(
        deps.model.as_ref(),
        &deps.settings.region,
        &excluded_cities,
        &excluded_categories,
    )
    .await;
    info!(?targets, "discovery targets chosen");

    let mut summary = StageSummary::default();
    let mut seen_place_ids = HashSet::new();

    for target in &targets {
        if target.city.is_empty() || target.category.is_empty() {
            warn!(?target, "skipping incomplete discovery target");
            continue;
        }
        deps.store
            .record_search(&target.city, &target.category)
            .await?;

        let places = match deps.places.search(&target.query()).await {
            Ok(places) => places,
            Err(err) => {
                warn!(query = %target.query(), error = %err, "places search failed");
                Vec::new()
            }
        };

        for place in places {
            summary.processed += 1;
            if !seen_place_ids.insert(place.id.clone()) {
                summary.skipped += 1;
                continue;
            }
            if deps.store.place_id_exists(&place.id).await? {
                summary.skipped += 1;
                continue;
            }

            let email = match place.website.as_deref() {
                Some(website) => deps.inspector.find_contact_email(website).await,
                None => None,
            };
            if let Some(email) = &email {
                if deps.store.email_exists(email).await? {
                    info!(business = %place.name, %email, "skipping business, e-mail already in use");
                    summary.skipped += 1;
                    continue;
                }
            }

            let new_lead = place.into_new_lead(&target.category, &target.city, email);
            match deps.store.insert_lead(new_lead).await {
                Ok(lead) => {
                    debug!(lead_id = %lead.id, business = %lead.business_name, "lead discovered");
                    summary.advanced += 1;
                }
                Err(RepositoryError::Conflict) => summary.skipped += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    if summary.advanced > 0 {
        let searched = targets
            .iter()
            .map(|target| target.query())
            .collect::<Vec<_>>()
            .join(", ");
        notify_quietly(
            deps.notifier.as_ref(),
            &format!(
                "Discovery completed: {} new businesses found ({searched})",
                summary.advanced
            ),
        )
        .await;
    }

    Ok(summary)
}
