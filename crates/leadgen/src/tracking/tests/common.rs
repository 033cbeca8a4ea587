use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::leads::{
    Campaign, Lead, LeadStatus, LeadStore, InMemoryLeadStore, NewLead, NewOutreach, Outreach,
    OutreachStatus,
};
use crate::tracking::{tracking_router, TrackingService, TrackingToken};

pub(super) const MESSAGE_ID: &str = "<seed-message@agency.example>";

pub(super) struct Seeded {
    pub store: InMemoryLeadStore,
    pub lead: Lead,
    pub campaign: Campaign,
    pub outreach: Outreach,
}

/// A lead with one sent outreach row, ready to be opened or clicked.
pub(super) async fn seeded_store() -> Seeded {
    let store = InMemoryLeadStore::new();
    let mut lead = store
        .insert_lead(NewLead {
            place_id: "place-1".to_string(),
            business_name: "Sunrise Bakery".to_string(),
            email: Some("owner@sunrise.example".to_string()),
            ..NewLead::default()
        })
        .await
        .expect("lead inserted");
    lead.status = LeadStatus::EmailSent;
    lead.email_sent_at = Some(Utc::now());
    store.update_lead(&lead).await.expect("lead updated");

    let date = NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date");
    let campaign = store
        .insert_campaign(Campaign::new(Campaign::daily_name(date), date, Utc::now()))
        .await
        .expect("campaign inserted");

    let token = TrackingToken::issue(lead.id, campaign.id);
    let mut outreach = store
        .insert_outreach(NewOutreach {
            lead_id: lead.id,
            campaign_id: campaign.id,
            to_email: "owner@sunrise.example".to_string(),
            subject: "Hello".to_string(),
            body_html: "<p>Hello</p>".to_string(),
            tracking_token: token.into_string(),
            ai_generated: true,
            attachment_paths: Vec::new(),
        })
        .await
        .expect("outreach inserted");
    outreach.status = OutreachStatus::Sent;
    outreach.sent_at = Some(Utc::now());
    outreach.provider_message_id = Some(MESSAGE_ID.to_string());
    store.update_outreach(&outreach).await.expect("outreach updated");

    Seeded {
        store,
        lead,
        campaign,
        outreach,
    }
}

pub(super) fn router_for(store: &InMemoryLeadStore) -> Router {
    let store: Arc<dyn LeadStore> = Arc::new(store.clone());
    tracking_router(Arc::new(TrackingService::new(store)))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
