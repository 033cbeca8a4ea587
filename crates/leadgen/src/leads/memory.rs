use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::domain::{
    Campaign, CampaignCounter, DailyReport, DayWindow, EmailEvent, EventKind, Lead, LeadStatus,
    NewEmailEvent, NewLead, NewOutreach, Outreach, OutreachStatus, SearchHistoryEntry,
};
use super::repository::{DayMetrics, LeadStore, RepositoryError};
use crate::tracking::{
    apply_delivery, apply_engagement, DeliveryUpdate, EngagementHit, EngagementOutcome,
};

#[derive(Debug, Default)]
struct MemoryState {
    leads: HashMap<Uuid, Lead>,
    campaigns: HashMap<Uuid, Campaign>,
    outreach: HashMap<Uuid, Outreach>,
    events: Vec<EmailEvent>,
    reports: HashMap<NaiveDate, DailyReport>,
    searches: Vec<SearchHistoryEntry>,
}

/// Process-local store used in development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLeadStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = self.state.lock().expect("lead store mutex poisoned");
        f(&mut guard)
    }

    pub fn events(&self) -> Vec<EmailEvent> {
        self.with_state(|state| state.events.clone())
    }

    pub fn reports(&self) -> Vec<DailyReport> {
        self.with_state(|state| state.reports.values().cloned().collect())
    }

    pub fn searches(&self) -> Vec<SearchHistoryEntry> {
        self.with_state(|state| state.searches.clone())
    }

    pub fn all_leads(&self) -> Vec<Lead> {
        self.with_state(|state| state.leads.values().cloned().collect())
    }

    pub fn all_outreach(&self) -> Vec<Outreach> {
        self.with_state(|state| state.outreach.values().cloned().collect())
    }

    /// Seeds a search history row with an explicit timestamp.
    pub fn push_search(&self, city: &str, category: &str, created_at: DateTime<Utc>) {
        self.with_state(|state| {
            state.searches.push(SearchHistoryEntry {
                id: Uuid::new_v4(),
                city: city.to_string(),
                category: category.to_string(),
                created_at,
            })
        })
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn missing_tables(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn recent_searches(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchHistoryEntry>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .searches
                .iter()
                .filter(|entry| entry.created_at >= since)
                .cloned()
                .collect()
        }))
    }

    async fn record_search(&self, city: &str, category: &str) -> Result<(), RepositoryError> {
        self.push_search(city, category, Utc::now());
        Ok(())
    }

    async fn place_id_exists(&self, place_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.with_state(|state| state.leads.values().any(|lead| lead.place_id == place_id)))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .leads
                .values()
                .any(|lead| lead.email.as_deref() == Some(email))
        }))
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, RepositoryError> {
        self.with_state(|state| {
            if state
                .leads
                .values()
                .any(|existing| existing.place_id == lead.place_id)
            {
                return Err(RepositoryError::Conflict);
            }
            let lead = Lead::from_new(lead, Utc::now());
            state.leads.insert(lead.id, lead.clone());
            Ok(lead)
        })
    }

    async fn lead(&self, id: Uuid) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.with_state(|state| state.leads.get(&id).cloned()))
    }

    async fn leads_with_status(&self, status: LeadStatus) -> Result<Vec<Lead>, RepositoryError> {
        let leads: Vec<Lead> = self.with_state(|state| {
            state
                .leads
                .values()
                .filter(|lead| lead.status == status)
                .cloned()
                .collect()
        });
        Ok(sorted_by(leads, |lead| lead.created_at))
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), RepositoryError> {
        self.with_state(|state| match state.leads.get_mut(&lead.id) {
            Some(existing) => {
                *existing = lead.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn latest_lead_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .leads
                .values()
                .filter(|lead| lead.email.as_deref() == Some(email))
                .max_by_key(|lead| lead.created_at)
                .cloned()
        }))
    }

    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, RepositoryError> {
        Ok(self.with_state(|state| state.campaigns.get(&id).cloned()))
    }

    async fn campaign_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Campaign>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .campaigns
                .values()
                .find(|campaign| campaign.campaign_date == date)
                .cloned()
        }))
    }

    async fn insert_campaign(&self, campaign: Campaign) -> Result<Campaign, RepositoryError> {
        self.with_state(|state| {
            if state
                .campaigns
                .values()
                .any(|existing| existing.campaign_date == campaign.campaign_date)
            {
                return Err(RepositoryError::Conflict);
            }
            state.campaigns.insert(campaign.id, campaign.clone());
            Ok(campaign)
        })
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<(), RepositoryError> {
        self.with_state(|state| match state.campaigns.get_mut(&campaign.id) {
            Some(existing) => {
                *existing = campaign.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn increment_campaign(
        &self,
        id: Uuid,
        counter: CampaignCounter,
    ) -> Result<(), RepositoryError> {
        self.with_state(|state| match state.campaigns.get_mut(&id) {
            Some(campaign) => {
                campaign.bump(counter);
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn insert_outreach(&self, outreach: NewOutreach) -> Result<Outreach, RepositoryError> {
        self.with_state(|state| {
            if state
                .outreach
                .values()
                .any(|existing| existing.tracking_token == outreach.tracking_token)
            {
                return Err(RepositoryError::Conflict);
            }
            let outreach = Outreach::from_new(outreach, Utc::now());
            state.outreach.insert(outreach.id, outreach.clone());
            Ok(outreach)
        })
    }

    async fn outreach_with_status(
        &self,
        status: OutreachStatus,
    ) -> Result<Vec<Outreach>, RepositoryError> {
        let rows: Vec<Outreach> = self.with_state(|state| {
            state
                .outreach
                .values()
                .filter(|outreach| outreach.status == status)
                .cloned()
                .collect()
        });
        Ok(sorted_by(rows, |outreach| outreach.created_at))
    }

    async fn outreach_by_token(&self, token: &str) -> Result<Option<Outreach>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .outreach
                .values()
                .find(|outreach| outreach.tracking_token == token)
                .cloned()
        }))
    }

    async fn latest_outreach_for_lead(
        &self,
        lead_id: Uuid,
    ) -> Result<Option<Outreach>, RepositoryError> {
        Ok(self.with_state(|state| {
            state
                .outreach
                .values()
                .filter(|outreach| outreach.lead_id == lead_id)
                .max_by_key(|outreach| outreach.created_at)
                .cloned()
        }))
    }

    async fn update_outreach(&self, outreach: &Outreach) -> Result<(), RepositoryError> {
        self.with_state(|state| match state.outreach.get_mut(&outreach.id) {
            Some(existing) => {
                *existing = outreach.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        })
    }

    async fn record_engagement(
        &self,
        token: &str,
        hit: EngagementHit,
    ) -> Result<Option<EngagementOutcome>, RepositoryError> {
        self.with_state(|state| {
            let Some(mut outreach) = state
                .outreach
                .values()
                .find(|outreach| outreach.tracking_token == token)
                .cloned()
            else {
                return Ok(None);
            };
            let Some(mut lead) = state.leads.get(&outreach.lead_id).cloned() else {
                return Ok(None);
            };

            let effects = apply_engagement(hit.kind, hit.occurred_at, &mut lead, &mut outreach);

            if !effects.counters.is_empty() {
                let campaign = state
                    .campaigns
                    .get_mut(&outreach.campaign_id)
                    .ok_or(RepositoryError::NotFound)?;
                for counter in &effects.counters {
                    campaign.bump(*counter);
                }
            }

            state.events.push(EmailEvent::from_new(
                NewEmailEvent {
                    lead_id: lead.id,
                    outreach_id: Some(outreach.id),
                    tracking_token: Some(token.to_string()),
                    event_type: hit.kind.event_kind(),
                    url_clicked: hit.url,
                    ip_address: hit.ip_address,
                    user_agent: hit.user_agent,
                },
                hit.occurred_at,
            ));

            let outcome = EngagementOutcome {
                lead_id: lead.id,
                outreach_id: outreach.id,
                campaign_id: outreach.campaign_id,
                kind: hit.kind,
                lead_status: lead.status,
                outreach_status: outreach.status,
                first_engagement: !effects.counters.is_empty(),
            };
            state.leads.insert(lead.id, lead);
            state.outreach.insert(outreach.id, outreach);
            Ok(Some(outcome))
        })
    }

    async fn record_event(&self, event: NewEmailEvent) -> Result<EmailEvent, RepositoryError> {
        let event = EmailEvent::from_new(event, Utc::now());
        self.with_state(|state| state.events.push(event.clone()));
        Ok(event)
    }

    async fn apply_delivery_update(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        Ok(self.with_state(|state| {
            state
                .outreach
                .values_mut()
                .filter(|outreach| outreach.provider_message_id.as_deref() == Some(provider_message_id))
                .map(|outreach| apply_delivery(update, now, outreach))
                .filter(|changed| *changed)
                .count() as u64
        }))
    }

    async fn day_metrics(&self, window: DayWindow) -> Result<DayMetrics, RepositoryError> {
        Ok(self.with_state(|state| {
            let count_leads = |pick: fn(&Lead) -> Option<DateTime<Utc>>| {
                state
                    .leads
                    .values()
                    .filter(|lead| window.contains_opt(pick(lead)))
                    .count() as i64
            };
            let count_events = |kind: EventKind| {
                state
                    .events
                    .iter()
                    .filter(|event| event.event_type == kind && window.contains(event.occurred_at))
                    .count() as i64
            };

            DayMetrics {
                leads_discovered: count_leads(|lead| Some(lead.discovered_at)),
                leads_qualified: count_leads(|lead| lead.qualified_at),
                emails_sent: state
                    .outreach
                    .values()
                    .filter(|outreach| window.contains_opt(outreach.sent_at))
                    .count() as i64,
                emails_opened: count_events(EventKind::Open),
                links_clicked: count_events(EventKind::Click),
                replies_received: count_leads(|lead| lead.first_replied_at),
            }
        }))
    }

    async fn report_leads(&self, window: DayWindow) -> Result<Vec<Lead>, RepositoryError> {
        let leads: Vec<Lead> = self.with_state(|state| {
            state
                .leads
                .values()
                .filter(|lead| window.contains(lead.discovered_at) || lead.status.is_engaged())
                .cloned()
                .collect()
        });
        Ok(sorted_by(leads, |lead| lead.discovered_at))
    }

    async fn save_daily_report(&self, report: &DailyReport) -> Result<(), RepositoryError> {
        self.with_state(|state| {
            state.reports.insert(report.report_date, report.clone());
        });
        Ok(())
    }
}
