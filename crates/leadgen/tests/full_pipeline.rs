//! A whole daily run followed by the recipient opening, clicking and the
//! provider confirming delivery.

mod common;

use std::sync::Arc;

use chrono::Utc;
use common::{Harness, ADMIN_EMAIL};
use leadgen::leads::{LeadStatus, LeadStore, OutreachStatus};
use leadgen::pipeline::PipelineStage;
use leadgen::tracking::{BrevoWebhook, ClientInfo, TrackingService};

#[tokio::test]
async fn daily_run_then_engagement_cascade() {
    let harness = Harness::pune_gyms();
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;

    let summaries = harness
        .runner
        .run_full_pipeline()
        .await
        .expect("pipeline completes");

    let stages: Vec<_> = summaries.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(stages, PipelineStage::DAILY_SEQUENCE.to_vec());
    let advanced = |stage: PipelineStage| {
        summaries
            .iter()
            .find(|(candidate, _)| *candidate == stage)
            .map(|(_, summary)| summary.advanced)
            .unwrap_or_default()
    };
    assert_eq!(advanced(PipelineStage::Discovery), 2);
    assert_eq!(advanced(PipelineStage::Qualification), 1);
    assert_eq!(advanced(PipelineStage::Personalization), 1);
    assert_eq!(advanced(PipelineStage::Outreach), 1);
    assert_eq!(advanced(PipelineStage::DailyReport), 1);

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "hello@chaicorner.example");
    assert_eq!(sent[1].to, ADMIN_EMAIL);

    let outreach = harness.store.all_outreach().remove(0);
    let store: Arc<dyn LeadStore> = Arc::new(harness.store.clone());
    let tracking = TrackingService::new(store);

    let opened = tracking
        .record_open(&outreach.tracking_token, ClientInfo::default())
        .await
        .expect("open recorded")
        .expect("token known");
    assert!(opened.first_engagement);
    assert_eq!(opened.lead_status, LeadStatus::Opened);

    let (destination, clicked) = tracking
        .record_click(
            &outreach.tracking_token,
            "https://agency.example/book",
            ClientInfo {
                ip_address: Some("203.0.113.7".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
            },
        )
        .await
        .expect("click recorded");
    assert_eq!(destination.as_str(), "https://agency.example/book");
    assert_eq!(
        clicked.expect("token known").outreach_status,
        OutreachStatus::Clicked
    );

    let changed = tracking
        .apply_webhook(&BrevoWebhook {
            event: "delivered".to_string(),
            email: Some("hello@chaicorner.example".to_string()),
            message_id: outreach.provider_message_id.clone(),
            reason: None,
        })
        .await
        .expect("webhook applied");
    assert_eq!(changed, 0, "delivery never downgrades a clicked row");

    let lead = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::Clicked);
    assert!(lead.first_opened_at.is_some());
    assert!(lead.first_clicked_at.is_some());

    let today = Utc::now().with_timezone(&chrono_tz::Asia::Kolkata).date_naive();
    let campaign = harness
        .store
        .campaign_for_date(today)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.emails_sent, 1);
    assert_eq!(campaign.emails_opened, 1);
    assert_eq!(campaign.links_clicked, 1);
}
