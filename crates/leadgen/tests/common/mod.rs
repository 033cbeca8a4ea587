//! Scripted doubles and a harness wiring them into a pipeline runner.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tempfile::TempDir;

use leadgen::discovery::{Place, PlaceSearch, PlacesError};
use leadgen::leads::{InMemoryLeadStore, Lead, LeadStore, NewLead};
use leadgen::notifications::MemoryNotifier;
use leadgen::outreach::DryRunMailer;
use leadgen::personalization::UnconfiguredModel;
use leadgen::pipeline::{PipelineDeps, PipelineRunner, PipelineSettings};
use leadgen::qualification::{SiteInspector, SiteReachability, WebPresenceReport};
use leadgen::replies::{InboundReply, InboxError, InboxPoller};

pub const ADMIN_EMAIL: &str = "owner@agency.example";
pub const FROM_EMAIL: &str = "hello@agency.example";
pub const PUBLIC_URL: &str = "https://leads.agency.example";

pub fn place(id: &str, name: &str, website: Option<&str>) -> Place {
    Place {
        id: id.to_string(),
        name: name.to_string(),
        formatted_address: Some(format!("{name}, Baner Road, Pune")),
        phone: Some("+91 20 5555 0100".to_string()),
        website: website.map(str::to_string),
        rating: Some(4.6),
        review_count: Some(87),
        maps_url: Some(format!("https://maps.google.com/?cid={id}")),
        raw: json!({ "id": id }),
    }
}

/// Returns canned places per query; unknown queries yield nothing.
#[derive(Default)]
pub struct ScriptedPlaces {
    results: HashMap<String, Vec<Place>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedPlaces {
    pub fn with(mut self, query: &str, places: Vec<Place>) -> Self {
        self.results.insert(query.to_string(), places);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries mutex poisoned").clone()
    }
}

#[async_trait]
impl PlaceSearch for ScriptedPlaces {
    async fn search(&self, query: &str) -> Result<Vec<Place>, PlacesError> {
        self.queries
            .lock()
            .expect("queries mutex poisoned")
            .push(query.to_string());
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

/// Website probe results and scraped e-mails keyed by website URL.
#[derive(Default)]
pub struct ScriptedInspector {
    emails: HashMap<String, String>,
    reachability: HashMap<String, SiteReachability>,
}

impl ScriptedInspector {
    pub fn email(mut self, website: &str, email: &str) -> Self {
        self.emails.insert(website.to_string(), email.to_string());
        self
    }

    pub fn reachability(mut self, website: &str, reachability: SiteReachability) -> Self {
        self.reachability.insert(website.to_string(), reachability);
        self
    }
}

#[async_trait]
impl SiteInspector for ScriptedInspector {
    async fn probe(&self, website_url: Option<&str>) -> WebPresenceReport {
        let reachability = website_url
            .and_then(|url| self.reachability.get(url).cloned())
            .unwrap_or(SiteReachability::Unresolved);
        WebPresenceReport {
            reachability: match website_url {
                Some(_) => reachability,
                None => SiteReachability::NoWebsite,
            },
        }
    }

    async fn find_contact_email(&self, website_url: &str) -> Option<String> {
        self.emails.get(website_url).cloned()
    }
}

/// Hands out its queued replies once, optionally after a delay or failing.
#[derive(Default)]
pub struct ScriptedInbox {
    pending: Mutex<Vec<InboundReply>>,
    delay: Duration,
    unreachable: bool,
}

impl ScriptedInbox {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn push(&self, from_email: &str, subject: &str) {
        self.push_received(from_email, subject, None);
    }

    pub fn push_received(
        &self,
        from_email: &str,
        subject: &str,
        received_at: Option<DateTime<Utc>>,
    ) {
        self.pending
            .lock()
            .expect("inbox mutex poisoned")
            .push(InboundReply {
                from_email: from_email.to_string(),
                subject: subject.to_string(),
                received_at,
            });
    }
}

#[async_trait]
impl InboxPoller for ScriptedInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboundReply>, InboxError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unreachable {
            return Err(InboxError::Connect(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "imap server refused the connection",
            )));
        }
        Ok(std::mem::take(
            &mut *self.pending.lock().expect("inbox mutex poisoned"),
        ))
    }
}

pub struct Harness {
    pub store: InMemoryLeadStore,
    pub places: Arc<ScriptedPlaces>,
    pub inbox: Arc<ScriptedInbox>,
    pub mailer: Arc<DryRunMailer>,
    pub notifier: Arc<MemoryNotifier>,
    pub runner: PipelineRunner,
    pub artifacts: TempDir,
}

impl Harness {
    pub fn new(places: ScriptedPlaces, inspector: ScriptedInspector) -> Self {
        Self::assemble(places, inspector, ScriptedInbox::default(), false)
    }

    pub fn with_inbox(
        places: ScriptedPlaces,
        inspector: ScriptedInspector,
        inbox: ScriptedInbox,
    ) -> Self {
        Self::assemble(places, inspector, inbox, false)
    }

    /// The artifacts directory is occupied by a plain file, so writing
    /// proposals or report sheets fails.
    pub fn with_blocked_artifacts(places: ScriptedPlaces, inspector: ScriptedInspector) -> Self {
        Self::assemble(places, inspector, ScriptedInbox::default(), true)
    }

    fn assemble(
        places: ScriptedPlaces,
        inspector: ScriptedInspector,
        inbox: ScriptedInbox,
        block_artifacts: bool,
    ) -> Self {
        let store = InMemoryLeadStore::new();
        let places = Arc::new(places);
        let inbox = Arc::new(inbox);
        let mailer = Arc::new(DryRunMailer::new(FROM_EMAIL));
        let notifier = Arc::new(MemoryNotifier::default());
        let artifacts = tempfile::tempdir().expect("temp dir");
        let artifacts_dir = if block_artifacts {
            let blocked = artifacts.path().join("blocked");
            std::fs::write(&blocked, b"not a directory").expect("blocking file");
            blocked
        } else {
            artifacts.path().to_path_buf()
        };

        let shared_store: Arc<dyn LeadStore> = Arc::new(store.clone());
        let runner = PipelineRunner::new(PipelineDeps {
            store: shared_store,
            places: places.clone(),
            inspector: Arc::new(inspector),
            model: Arc::new(UnconfiguredModel),
            mailer: mailer.clone(),
            inbox: inbox.clone(),
            notifier: notifier.clone(),
            settings: PipelineSettings {
                region: "India".to_string(),
                timezone: chrono_tz::Asia::Kolkata,
                public_url: PUBLIC_URL.to_string(),
                call_to_action_url: Some("https://agency.example/book".to_string()),
                reply_address: FROM_EMAIL.to_string(),
                send_interval: Duration::ZERO,
                artifacts_dir,
                admin_email: Some(ADMIN_EMAIL.to_string()),
            },
        });

        Self {
            store,
            places,
            inbox,
            mailer,
            notifier,
            runner,
            artifacts,
        }
    }

    /// A listing without a website whose owner e-mail is already known;
    /// it scores 55 and qualifies.
    pub async fn seed_lead(&self, place_id: &str, name: &str, email: &str) -> Lead {
        self.store
            .insert_lead(NewLead {
                place_id: place_id.to_string(),
                business_name: name.to_string(),
                category: Some("Cafes".to_string()),
                city: Some("Ahmedabad".to_string()),
                phone: Some("+91 79 5555 0199".to_string()),
                email: Some(email.to_string()),
                rating: Some(4.3),
                review_count: Some(41),
                ..NewLead::default()
            })
            .await
            .expect("seed lead")
    }

    /// Two gyms in Pune: one scrapes to an e-mail, one has no website.
    pub fn pune_gyms() -> Self {
        let places = ScriptedPlaces::default().with(
            "Gyms in Pune",
            vec![
                place("gym-1", "Iron Temple", Some("https://irontemple.example")),
                place("gym-2", "Flex Studio", None),
            ],
        );
        let inspector = ScriptedInspector::default()
            .email("https://irontemple.example", "owner@irontemple.example")
            .reachability("https://irontemple.example", SiteReachability::Unresolved);
        Self::new(places, inspector)
    }
}
