//! Engagement status lattice shared by every store implementation.
//!
//! Opens and clicks only ever move a lead or outreach row forward; a click
//! implies an open, and either implies delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::leads::{CampaignCounter, EventKind, Lead, LeadStatus, Outreach, OutreachStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Open,
    Click,
}

impl EngagementKind {
    pub const fn event_kind(self) -> EventKind {
        match self {
            EngagementKind::Open => EventKind::Open,
            EngagementKind::Click => EventKind::Click,
        }
    }
}

/// A single pixel load or link click as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementHit {
    pub kind: EngagementKind,
    pub url: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EngagementHit {
    pub fn open(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            kind: EngagementKind::Open,
            url: None,
            ip_address,
            user_agent,
            occurred_at: Utc::now(),
        }
    }

    pub fn click(url: String, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            kind: EngagementKind::Click,
            url: Some(url),
            ip_address,
            user_agent,
            occurred_at: Utc::now(),
        }
    }
}

/// Side effects of a hit that the store must persist next to the row updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeEffects {
    pub counters: Vec<CampaignCounter>,
}

/// Result of a recorded hit, returned to callers for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementOutcome {
    pub lead_id: Uuid,
    pub outreach_id: Uuid,
    pub campaign_id: Uuid,
    pub kind: EngagementKind,
    pub lead_status: LeadStatus,
    pub outreach_status: OutreachStatus,
    pub first_engagement: bool,
}

const LEAD_OPEN_FROM: &[LeadStatus] = &[LeadStatus::QueuedForSend, LeadStatus::EmailSent];
const LEAD_CLICK_FROM: &[LeadStatus] = &[
    LeadStatus::QueuedForSend,
    LeadStatus::EmailSent,
    LeadStatus::Opened,
];
const OUTREACH_OPEN_FROM: &[OutreachStatus] = &[
    OutreachStatus::Queued,
    OutreachStatus::Sent,
    OutreachStatus::Delivered,
];
const OUTREACH_CLICK_FROM: &[OutreachStatus] = &[
    OutreachStatus::Queued,
    OutreachStatus::Sent,
    OutreachStatus::Delivered,
    OutreachStatus::Opened,
];

/// Applies an open or click to the lead and outreach rows in place.
pub fn apply_engagement(
    kind: EngagementKind,
    now: DateTime<Utc>,
    lead: &mut Lead,
    outreach: &mut Outreach,
) -> CascadeEffects {
    let mut effects = CascadeEffects::default();

    if kind == EngagementKind::Click && lead.first_clicked_at.is_none() {
        lead.first_clicked_at = Some(now);
        effects.counters.push(CampaignCounter::LinksClicked);
    }

    if lead.first_opened_at.is_none() {
        lead.first_opened_at = Some(now);
        effects.counters.push(CampaignCounter::EmailsOpened);
    }

    if outreach.delivered_at.is_none() {
        outreach.delivered_at = Some(now);
    }

    let (lead_from, lead_to, outreach_from, outreach_to) = match kind {
        EngagementKind::Open => (
            LEAD_OPEN_FROM,
            LeadStatus::Opened,
            OUTREACH_OPEN_FROM,
            OutreachStatus::Opened,
        ),
        EngagementKind::Click => (
            LEAD_CLICK_FROM,
            LeadStatus::Clicked,
            OUTREACH_CLICK_FROM,
            OutreachStatus::Clicked,
        ),
    };

    if lead_from.contains(&lead.status) {
        lead.status = lead_to;
    }
    if outreach_from.contains(&outreach.status) {
        outreach.status = outreach_to;
    }
    lead.updated_at = now;

    effects
}

/// Provider-reported delivery state for a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryUpdate {
    Delivered,
    Bounced { reason: String },
}

impl DeliveryUpdate {
    /// Maps a provider webhook event name; unknown events are ignored.
    pub fn from_event(event: &str, reason: Option<&str>) -> Option<Self> {
        match event {
            "delivered" => Some(Self::Delivered),
            "bounced" | "hard_bounce" | "soft_bounce" | "spam" | "blocked" => {
                let reason = reason
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .unwrap_or(event);
                Some(Self::Bounced {
                    reason: reason.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Applies a delivery update; returns whether the row changed.
pub fn apply_delivery(update: &DeliveryUpdate, now: DateTime<Utc>, outreach: &mut Outreach) -> bool {
    match update {
        DeliveryUpdate::Delivered => {
            if matches!(outreach.status, OutreachStatus::Queued | OutreachStatus::Sent) {
                outreach.status = OutreachStatus::Delivered;
                if outreach.delivered_at.is_none() {
                    outreach.delivered_at = Some(now);
                }
                true
            } else {
                false
            }
        }
        DeliveryUpdate::Bounced { reason } => {
            if matches!(
                outreach.status,
                OutreachStatus::Queued | OutreachStatus::Sent | OutreachStatus::Delivered
            ) {
                outreach.status = OutreachStatus::Bounced;
                outreach.bounce_reason = Some(reason.clone());
                true
            } else {
                false
            }
        }
    }
}
