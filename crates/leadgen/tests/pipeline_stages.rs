//! Each pipeline stage run in isolation against the in-memory store and
//! scripted collaborators.

mod common;

use chrono::Utc;
use common::{place, Harness, ScriptedInspector, ScriptedPlaces, ADMIN_EMAIL, PUBLIC_URL};
use leadgen::leads::{CampaignStatus, EventKind, LeadStatus, LeadStore, OutreachStatus};
use leadgen::pipeline::PipelineStage;

fn today() -> chrono::NaiveDate {
    Utc::now().with_timezone(&chrono_tz::Asia::Kolkata).date_naive()
}

#[tokio::test]
async fn discovery_stores_new_places_and_records_searches() {
    let harness = Harness::pune_gyms();

    let summary = harness
        .runner
        .run_stage(PipelineStage::Discovery)
        .await
        .expect("discovery runs");

    assert_eq!(summary.advanced, 2);
    assert_eq!(
        harness.places.queries(),
        vec!["Gyms in Pune".to_string(), "Cafes in Ahmedabad".to_string()]
    );
    assert_eq!(harness.store.searches().len(), 2);

    let leads = harness.store.all_leads();
    let iron = leads
        .iter()
        .find(|lead| lead.place_id == "gym-1")
        .expect("iron temple stored");
    assert_eq!(iron.email.as_deref(), Some("owner@irontemple.example"));
    assert_eq!(iron.city.as_deref(), Some("Pune"));
    assert_eq!(iron.category.as_deref(), Some("Gyms"));
    assert_eq!(iron.status, LeadStatus::Discovered);
    assert!(harness.notifier.messages()[0].contains("2 new businesses"));
}

#[tokio::test]
async fn discovery_skips_known_places_and_reused_emails() {
    let places = ScriptedPlaces::default()
        .with(
            "Gyms in Pune",
            vec![
                place("gym-1", "Iron Temple", Some("https://irontemple.example")),
                place("gym-1", "Iron Temple", Some("https://irontemple.example")),
                place("gym-9", "Iron Temple Annexe", Some("https://annexe.example")),
            ],
        );
    let inspector = ScriptedInspector::default()
        .email("https://irontemple.example", "owner@irontemple.example")
        .email("https://annexe.example", "owner@irontemple.example");
    let harness = Harness::new(places, inspector);

    let first = harness
        .runner
        .run_stage(PipelineStage::Discovery)
        .await
        .expect("first discovery");
    assert_eq!(first.advanced, 1);
    assert_eq!(first.skipped, 2);

    let second = harness
        .runner
        .run_stage(PipelineStage::Discovery)
        .await
        .expect("second discovery");
    assert_eq!(second.advanced, 0);
    assert_eq!(harness.store.all_leads().len(), 1);
}

#[tokio::test]
async fn qualification_scores_and_gates_on_email() {
    let harness = Harness::pune_gyms();
    harness
        .runner
        .run_stage(PipelineStage::Discovery)
        .await
        .expect("discovery");
    let seeded = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;

    let summary = harness
        .runner
        .run_stage(PipelineStage::Qualification)
        .await
        .expect("qualification");

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.advanced, 1);

    let leads = harness.store.all_leads();
    let by_place = |id: &str| {
        leads
            .iter()
            .find(|lead| lead.place_id == id)
            .cloned()
            .expect("lead present")
    };

    // Unresolved domain (30) + rating (10) + phone (5) falls short.
    let iron = by_place("gym-1");
    assert_eq!(iron.qualification_score, 45);
    assert_eq!(iron.status, LeadStatus::Rejected);
    assert!(iron.has_website);

    // Scores high but there is nobody to write to.
    let flex = by_place("gym-2");
    assert_eq!(flex.qualification_score, 55);
    assert_eq!(flex.status, LeadStatus::Rejected);

    let cafe = by_place("cafe-1");
    assert_eq!(cafe.id, seeded.id);
    assert_eq!(cafe.status, LeadStatus::Qualified);
    assert!(cafe.qualified_at.is_some());
    assert!(cafe
        .web_presence_notes
        .as_deref()
        .unwrap_or_default()
        .contains("No website URL"));
}

#[tokio::test]
async fn personalization_queues_tracked_outreach_with_proposal() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    harness
        .runner
        .run_stage(PipelineStage::Qualification)
        .await
        .expect("qualification");

    let summary = harness
        .runner
        .run_stage(PipelineStage::Personalization)
        .await
        .expect("personalization");
    assert_eq!(summary.advanced, 1);

    let outreach = harness.store.all_outreach();
    assert_eq!(outreach.len(), 1);
    let row = &outreach[0];
    assert_eq!(row.status, OutreachStatus::Queued);
    assert_eq!(row.to_email, "hello@chaicorner.example");
    assert_eq!(row.subject, "Enhance Chai Corner Digital Presence");
    assert!(!row.ai_generated);
    assert!(row.body_html.contains(&format!(
        "{PUBLIC_URL}/api/v1/track/open/{}",
        row.tracking_token
    )));
    assert!(row
        .body_html
        .contains(&format!("{PUBLIC_URL}/api/v1/track/click/{}", row.tracking_token)));

    let proposal = std::path::Path::new(&row.attachment_paths[0]);
    assert!(proposal.starts_with(harness.artifacts.path()));
    assert!(proposal.exists());

    let campaign = harness
        .store
        .campaign_for_date(today())
        .await
        .expect("campaign lookup")
        .expect("campaign created");
    assert_eq!(campaign.total_leads, 1);
    assert_eq!(campaign.status, CampaignStatus::Pending);

    let lead = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::QueuedForSend);
}

#[tokio::test]
async fn outreach_sends_and_completes_campaign() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    for stage in [PipelineStage::Qualification, PipelineStage::Personalization] {
        harness.runner.run_stage(stage).await.expect("stage runs");
    }
    let proposal = harness.store.all_outreach()[0].attachment_paths[0].clone();

    let summary = harness
        .runner
        .run_stage(PipelineStage::Outreach)
        .await
        .expect("outreach");
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.failed, 0);

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "hello@chaicorner.example");
    assert_eq!(sent[0].attachments.len(), 1);
    assert!(!std::path::Path::new(&proposal).exists());

    let row = &harness.store.all_outreach()[0];
    assert_eq!(row.status, OutreachStatus::Sent);
    assert!(row.sent_at.is_some());
    assert!(row
        .provider_message_id
        .as_deref()
        .unwrap_or_default()
        .ends_with("@agency.example>"));

    let lead = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::EmailSent);
    assert!(lead.email_sent_at.is_some());

    let campaign = harness
        .store
        .campaign_for_date(today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.emails_sent, 1);
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert!(campaign.started_at.is_some());
    assert!(campaign.completed_at.is_some());
}

#[tokio::test]
async fn outreach_marks_row_failed_when_send_fails() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    for stage in [PipelineStage::Qualification, PipelineStage::Personalization] {
        harness.runner.run_stage(stage).await.expect("stage runs");
    }
    let proposal = harness.store.all_outreach()[0].attachment_paths[0].clone();
    std::fs::remove_file(&proposal).expect("remove proposal");

    let summary = harness
        .runner
        .run_stage(PipelineStage::Outreach)
        .await
        .expect("outreach pass completes");

    assert_eq!(summary.failed, 1);
    assert!(harness.mailer.sent().is_empty());
    assert_eq!(
        harness.store.all_outreach()[0].status,
        OutreachStatus::Failed
    );
    let lead = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::QueuedForSend);
}

#[tokio::test]
async fn reply_poll_marks_lead_replied_once() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    for stage in [
        PipelineStage::Qualification,
        PipelineStage::Personalization,
        PipelineStage::Outreach,
    ] {
        harness.runner.run_stage(stage).await.expect("stage runs");
    }

    harness
        .inbox
        .push("hello@chaicorner.example", "Re: Enhance Chai Corner Digital Presence");
    harness.inbox.push("stranger@example.com", "Hello?");
    let summary = harness
        .runner
        .run_stage(PipelineStage::ReplyPoll)
        .await
        .expect("reply poll");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.skipped, 1);

    let replied = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(replied.status, LeadStatus::Replied);
    let first_replied_at = replied.first_replied_at.expect("reply time recorded");

    let reply_events: Vec<_> = harness
        .store
        .events()
        .into_iter()
        .filter(|event| event.event_type == EventKind::Reply)
        .collect();
    assert_eq!(reply_events.len(), 1);
    assert_eq!(reply_events[0].lead_id, lead.id);
    assert!(reply_events[0].outreach_id.is_some());

    let campaign = harness
        .store
        .campaign_for_date(today())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.replies_received, 1);
    assert!(harness
        .notifier
        .messages()
        .iter()
        .any(|message| message.starts_with("Reply detected!") && message.contains("Chai Corner")));

    harness.inbox.push("hello@chaicorner.example", "Re: one more thing");
    let again = harness
        .runner
        .run_stage(PipelineStage::ReplyPoll)
        .await
        .expect("second poll");
    assert_eq!(again.advanced, 0);
    let unchanged = harness.store.lead(lead.id).await.unwrap().unwrap();
    assert_eq!(unchanged.first_replied_at, Some(first_replied_at));
}

#[tokio::test]
async fn reply_is_dated_when_processed_not_when_sent() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    let lead = harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    for stage in [
        PipelineStage::Qualification,
        PipelineStage::Personalization,
        PipelineStage::Outreach,
    ] {
        harness.runner.run_stage(stage).await.expect("stage runs");
    }

    let sent_yesterday = Utc::now() - chrono::Duration::days(1);
    harness.inbox.push_received(
        "hello@chaicorner.example",
        "Re: your proposal",
        Some(sent_yesterday),
    );
    let polled_from = Utc::now();
    harness
        .runner
        .run_stage(PipelineStage::ReplyPoll)
        .await
        .expect("reply poll");

    let replied = harness.store.lead(lead.id).await.unwrap().unwrap();
    let first_replied_at = replied.first_replied_at.expect("reply time recorded");
    assert!(first_replied_at >= polled_from);

    let report = harness
        .runner
        .run_stage(PipelineStage::DailyReport)
        .await
        .expect("report stage");
    assert_eq!(report.advanced, 1);
    assert_eq!(harness.store.reports()[0].replies_received, 1);
}

#[tokio::test]
async fn daily_report_is_skipped_without_a_campaign() {
    let harness = Harness::pune_gyms();

    let summary = harness
        .runner
        .run_stage(PipelineStage::DailyReport)
        .await
        .expect("report stage");

    assert_eq!(summary.skipped, 1);
    assert!(harness.store.reports().is_empty());
    assert!(harness.mailer.sent().is_empty());
}

#[tokio::test]
async fn daily_report_persists_metrics_and_mails_sheets() {
    let harness = Harness::new(ScriptedPlaces::default(), ScriptedInspector::default());
    harness
        .seed_lead("cafe-1", "Chai Corner", "hello@chaicorner.example")
        .await;
    for stage in [
        PipelineStage::Qualification,
        PipelineStage::Personalization,
        PipelineStage::Outreach,
    ] {
        harness.runner.run_stage(stage).await.expect("stage runs");
    }

    let summary = harness
        .runner
        .run_stage(PipelineStage::DailyReport)
        .await
        .expect("report");
    assert_eq!(summary.advanced, 1);

    let reports = harness.store.reports();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.report_date, today());
    assert_eq!(report.leads_discovered, 1);
    assert_eq!(report.leads_qualified, 1);
    assert_eq!(report.emails_sent, 1);
    assert_eq!(report.pipeline_status, "completed");
    assert_eq!(report.email_sent_to.as_deref(), Some(ADMIN_EMAIL));

    let mail = harness.mailer.sent().pop().expect("report mailed");
    assert_eq!(mail.to, ADMIN_EMAIL);
    assert!(mail.subject.starts_with("[LeadGen] Daily Report - "));
    assert!(mail.subject.ends_with("| 1 sent | 0 clicks"));
    assert_eq!(mail.attachments.len(), 2);

    let leads_sheet = std::fs::read_to_string(&mail.attachments[1].path).expect("lead sheet");
    assert!(leads_sheet.contains("Chai Corner"));
    assert!(mail.attachments[0]
        .path
        .starts_with(harness.artifacts.path().join("reports")));
}
