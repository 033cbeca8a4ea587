use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of a lead in the outreach funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Discovered,
    Qualified,
    Rejected,
    QueuedForSend,
    EmailSent,
    Opened,
    Clicked,
    Replied,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Discovered => "discovered",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Rejected => "rejected",
            LeadStatus::QueuedForSend => "queued_for_send",
            LeadStatus::EmailSent => "email_sent",
            LeadStatus::Opened => "opened",
            LeadStatus::Clicked => "clicked",
            LeadStatus::Replied => "replied",
        }
    }

    /// Statuses that show up in the daily lead sheet regardless of discovery date.
    pub const fn is_engaged(self) -> bool {
        matches!(
            self,
            LeadStatus::EmailSent | LeadStatus::Opened | LeadStatus::Clicked | LeadStatus::Replied
        )
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeadStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "discovered" => Ok(Self::Discovered),
            "qualified" => Ok(Self::Qualified),
            "rejected" => Ok(Self::Rejected),
            "queued_for_send" => Ok(Self::QueuedForSend),
            "email_sent" => Ok(Self::EmailSent),
            "opened" => Ok(Self::Opened),
            "clicked" => Ok(Self::Clicked),
            "replied" => Ok(Self::Replied),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Delivery state of a single outreach e-mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachStatus {
    Queued,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Failed,
}

impl OutreachStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OutreachStatus::Queued => "queued",
            OutreachStatus::Sent => "sent",
            OutreachStatus::Delivered => "delivered",
            OutreachStatus::Opened => "opened",
            OutreachStatus::Clicked => "clicked",
            OutreachStatus::Bounced => "bounced",
            OutreachStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutreachStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutreachStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "opened" => Ok(Self::Opened),
            "clicked" => Ok(Self::Clicked),
            "bounced" => Ok(Self::Bounced),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Running,
    Completed,
}

impl CampaignStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Open,
    Click,
    Reply,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Click => "click",
            EventKind::Reply => "reply",
        }
    }
}

impl FromStr for EventKind {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "click" => Ok(Self::Click),
            "reply" => Ok(Self::Reply),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status value '{0}'")]
pub struct UnknownStatus(pub String);

/// A discovered business and everything learned about it along the funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub place_id: String,
    pub business_name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website_url: Option<String>,
    pub google_maps_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub qualification_score: i32,
    pub has_website: bool,
    pub has_social_media: bool,
    pub web_presence_notes: Option<String>,
    pub status: LeadStatus,
    pub discovered_at: DateTime<Utc>,
    pub qualified_at: Option<DateTime<Utc>>,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub first_opened_at: Option<DateTime<Utc>>,
    pub first_clicked_at: Option<DateTime<Utc>>,
    pub first_replied_at: Option<DateTime<Utc>>,
    pub raw_places_data: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn from_new(new: NewLead, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            has_website: new.website_url.is_some(),
            place_id: new.place_id,
            business_name: new.business_name,
            category: new.category,
            address: new.address,
            city: new.city,
            phone: new.phone,
            email: new.email,
            website_url: new.website_url,
            google_maps_url: new.google_maps_url,
            rating: new.rating,
            review_count: new.review_count,
            qualification_score: 0,
            has_social_media: false,
            web_presence_notes: None,
            status: LeadStatus::Discovered,
            discovered_at: now,
            qualified_at: None,
            email_sent_at: None,
            first_opened_at: None,
            first_clicked_at: None,
            first_replied_at: None,
            raw_places_data: new.raw_places_data,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// City if known, otherwise the formatted address.
    pub fn location_label(&self) -> String {
        self.city
            .clone()
            .or_else(|| self.address.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Insert payload for a freshly discovered business.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewLead {
    pub place_id: String,
    pub business_name: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website_url: Option<String>,
    pub google_maps_url: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub raw_places_data: Option<serde_json::Value>,
}

/// Dated batch of outreach with aggregate counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub campaign_date: NaiveDate,
    pub status: CampaignStatus,
    pub total_leads: i32,
    pub emails_sent: i32,
    pub emails_opened: i32,
    pub links_clicked: i32,
    pub replies_received: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(name: String, campaign_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            campaign_date,
            status: CampaignStatus::Pending,
            total_leads: 0,
            emails_sent: 0,
            emails_opened: 0,
            links_clicked: 0,
            replies_received: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
        }
    }

    pub fn daily_name(date: NaiveDate) -> String {
        format!("Daily Outreach {}", date.format("%Y-%m-%d"))
    }

    pub fn bump(&mut self, counter: CampaignCounter) {
        match counter {
            CampaignCounter::TotalLeads => self.total_leads += 1,
            CampaignCounter::EmailsSent => self.emails_sent += 1,
            CampaignCounter::EmailsOpened => self.emails_opened += 1,
            CampaignCounter::LinksClicked => self.links_clicked += 1,
            CampaignCounter::RepliesReceived => self.replies_received += 1,
        }
    }
}

/// Campaign aggregate columns that stages increment atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignCounter {
    TotalLeads,
    EmailsSent,
    EmailsOpened,
    LinksClicked,
    RepliesReceived,
}

impl CampaignCounter {
    pub const fn column(self) -> &'static str {
        match self {
            CampaignCounter::TotalLeads => "total_leads",
            CampaignCounter::EmailsSent => "emails_sent",
            CampaignCounter::EmailsOpened => "emails_opened",
            CampaignCounter::LinksClicked => "links_clicked",
            CampaignCounter::RepliesReceived => "replies_received",
        }
    }
}

/// One personalized e-mail tied to a lead and a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outreach {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub campaign_id: Uuid,
    pub to_email: String,
    pub subject: String,
    pub body_html: String,
    pub tracking_token: String,
    pub ai_generated: bool,
    pub attachment_paths: Vec<String>,
    pub status: OutreachStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub bounce_reason: Option<String>,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Outreach {
    pub fn from_new(new: NewOutreach, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id: new.lead_id,
            campaign_id: new.campaign_id,
            to_email: new.to_email,
            subject: new.subject,
            body_html: new.body_html,
            tracking_token: new.tracking_token,
            ai_generated: new.ai_generated,
            attachment_paths: new.attachment_paths,
            status: OutreachStatus::Queued,
            sent_at: None,
            delivered_at: None,
            bounce_reason: None,
            provider_message_id: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOutreach {
    pub lead_id: Uuid,
    pub campaign_id: Uuid,
    pub to_email: String,
    pub subject: String,
    pub body_html: String,
    pub tracking_token: String,
    pub ai_generated: bool,
    pub attachment_paths: Vec<String>,
}

/// Append-only engagement log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailEvent {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub outreach_id: Option<Uuid>,
    pub tracking_token: Option<String>,
    pub event_type: EventKind,
    pub url_clicked: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEmailEvent {
    pub lead_id: Uuid,
    pub outreach_id: Option<Uuid>,
    pub tracking_token: Option<String>,
    pub event_type: EventKind,
    pub url_clicked: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl EmailEvent {
    pub fn from_new(new: NewEmailEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id: new.lead_id,
            outreach_id: new.outreach_id,
            tracking_token: new.tracking_token,
            event_type: new.event_type,
            url_clicked: new.url_clicked,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            occurred_at: now,
        }
    }
}

/// Persisted daily pipeline summary; one row per report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub report_date: NaiveDate,
    pub leads_discovered: i32,
    pub leads_qualified: i32,
    pub emails_sent: i32,
    pub emails_opened: i32,
    pub links_clicked: i32,
    pub replies_received: i32,
    pub new_conversions: i32,
    pub report_file_path: Option<String>,
    pub email_sent_to: Option<String>,
    pub pipeline_started_at: Option<DateTime<Utc>>,
    pub pipeline_ended_at: Option<DateTime<Utc>>,
    pub pipeline_status: String,
    pub error_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub city: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Half-open `[start, end)` UTC window covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// Window for the local day containing `instant` in `tz`.
    pub fn local_day<Tz: chrono::TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> Self {
        let date = instant.with_timezone(tz).date_naive();
        Self::for_date(date, tz)
    }

    pub fn for_date<Tz: chrono::TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let start = local_midnight(date, tz);
        let end = date
            .succ_opt()
            .map(|next| local_midnight(next, tz))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { date, start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn contains_opt(&self, instant: Option<DateTime<Utc>>) -> bool {
        instant.map(|value| self.contains(value)).unwrap_or(false)
    }
}

fn local_midnight<Tz: chrono::TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(value) => value.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight skipped by a DST jump; treat the naive time as UTC offset-free.
        chrono::LocalResult::None => midnight.and_utc(),
    }
}
