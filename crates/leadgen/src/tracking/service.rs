use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::cascade::{DeliveryUpdate, EngagementHit, EngagementOutcome};
use crate::leads::{LeadStore, RepositoryError};

/// Client details captured from the tracking request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Delivery event posted by the Brevo transactional webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct BrevoWebhook {
    #[serde(default)]
    pub event: String,
    pub email: Option<String>,
    #[serde(rename = "message-id")]
    pub message_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("redirect target must be an absolute http(s) url")]
    InvalidTarget,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Only absolute `http`/`https` URLs are redirected to.
pub fn validate_redirect(target: &str) -> Result<url::Url, TrackingError> {
    let parsed = url::Url::parse(target.trim()).map_err(|_| TrackingError::InvalidTarget)?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(TrackingError::InvalidTarget),
    }
}

pub struct TrackingService {
    store: Arc<dyn LeadStore>,
}

impl TrackingService {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    pub async fn record_open(
        &self,
        token: &str,
        client: ClientInfo,
    ) -> Result<Option<EngagementOutcome>, TrackingError> {
        let hit = EngagementHit::open(client.ip_address, client.user_agent);
        self.record(token, hit).await
    }

    /// Validates the target before anything is written; returns it for the redirect.
    pub async fn record_click(
        &self,
        token: &str,
        target: &str,
        client: ClientInfo,
    ) -> Result<(url::Url, Option<EngagementOutcome>), TrackingError> {
        let destination = validate_redirect(target)?;
        let hit = EngagementHit::click(
            destination.to_string(),
            client.ip_address,
            client.user_agent,
        );
        let outcome = self.record(token, hit).await?;
        Ok((destination, outcome))
    }

    async fn record(
        &self,
        token: &str,
        hit: EngagementHit,
    ) -> Result<Option<EngagementOutcome>, TrackingError> {
        let kind = hit.kind;
        let outcome = self.store.record_engagement(token, hit).await?;
        match &outcome {
            Some(outcome) => info!(
                lead_id = %outcome.lead_id,
                outreach_id = %outcome.outreach_id,
                ?kind,
                lead_status = %outcome.lead_status,
                first = outcome.first_engagement,
                "engagement recorded"
            ),
            None => debug!(%token, ?kind, "engagement for unknown token ignored"),
        }
        Ok(outcome)
    }

    /// Returns the number of outreach rows changed by the event.
    pub async fn apply_webhook(&self, payload: &BrevoWebhook) -> Result<u64, TrackingError> {
        let Some(update) = DeliveryUpdate::from_event(&payload.event, payload.reason.as_deref())
        else {
            debug!(event = %payload.event, "ignoring webhook event");
            return Ok(0);
        };
        let Some(message_id) = payload
            .message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            debug!(event = %payload.event, "webhook event without message id");
            return Ok(0);
        };

        let changed = self.store.apply_delivery_update(message_id, &update).await?;
        info!(
            event = %payload.event,
            email = payload.email.as_deref().unwrap_or(""),
            changed,
            "delivery webhook applied"
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_absolute_web_targets() {
        assert!(validate_redirect("https://example.com/menu?x=1").is_ok());
        assert!(validate_redirect("http://example.com").is_ok());
        assert!(validate_redirect("javascript:alert(1)").is_err());
        assert!(validate_redirect("/relative/path").is_err());
        assert!(validate_redirect("ftp://example.com/file").is_err());
    }

    #[test]
    fn webhook_payload_reads_dashed_message_id() {
        let payload: BrevoWebhook = serde_json::from_str(
            r#"{"event":"hard_bounce","email":"a@b.c","message-id":"<x@y>","reason":"mailbox full"}"#,
        )
        .unwrap();
        assert_eq!(payload.message_id.as_deref(), Some("<x@y>"));
        assert_eq!(payload.reason.as_deref(), Some("mailbox full"));
    }
}
