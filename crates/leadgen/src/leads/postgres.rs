//! PostgreSQL-backed [`LeadStore`] built on a `sqlx::PgPool`.
//!
//! Status columns are stored as their lowercase labels and parsed back on
//! read; the engagement cascade runs inside a transaction with the outreach
//! and lead rows locked `FOR UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use super::domain::{
    Campaign, CampaignCounter, DailyReport, DayWindow, EmailEvent, Lead, LeadStatus, NewEmailEvent,
    NewLead, NewOutreach, Outreach, OutreachStatus, SearchHistoryEntry,
};
use super::repository::{DayMetrics, LeadStore, RepositoryError, REQUIRED_TABLES};
use crate::tracking::{
    apply_delivery, apply_engagement, DeliveryUpdate, EngagementHit, EngagementOutcome,
};

#[derive(Clone)]
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    id: Uuid,
    place_id: String,
    business_name: String,
    category: Option<String>,
    address: Option<String>,
    city: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    website_url: Option<String>,
    google_maps_url: Option<String>,
    rating: Option<f64>,
    review_count: Option<i32>,
    qualification_score: i32,
    has_website: bool,
    has_social_media: bool,
    web_presence_notes: Option<String>,
    status: String,
    discovered_at: DateTime<Utc>,
    qualified_at: Option<DateTime<Utc>>,
    email_sent_at: Option<DateTime<Utc>>,
    first_opened_at: Option<DateTime<Utc>>,
    first_clicked_at: Option<DateTime<Utc>>,
    first_replied_at: Option<DateTime<Utc>>,
    raw_places_data: Option<serde_json::Value>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = RepositoryError;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: row.id,
            place_id: row.place_id,
            business_name: row.business_name,
            category: row.category,
            address: row.address,
            city: row.city,
            phone: row.phone,
            email: row.email,
            website_url: row.website_url,
            google_maps_url: row.google_maps_url,
            rating: row.rating,
            review_count: row.review_count,
            qualification_score: row.qualification_score,
            has_website: row.has_website,
            has_social_media: row.has_social_media,
            web_presence_notes: row.web_presence_notes,
            status: row.status.parse::<LeadStatus>()?,
            discovered_at: row.discovered_at,
            qualified_at: row.qualified_at,
            email_sent_at: row.email_sent_at,
            first_opened_at: row.first_opened_at,
            first_clicked_at: row.first_clicked_at,
            first_replied_at: row.first_replied_at,
            raw_places_data: row.raw_places_data,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    name: String,
    campaign_date: NaiveDate,
    status: String,
    total_leads: i32,
    emails_sent: i32,
    emails_opened: i32,
    links_clicked: i32,
    replies_received: i32,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = RepositoryError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: row.id,
            name: row.name,
            campaign_date: row.campaign_date,
            status: row.status.parse()?,
            total_leads: row.total_leads,
            emails_sent: row.emails_sent,
            emails_opened: row.emails_opened,
            links_clicked: row.links_clicked,
            replies_received: row.replies_received,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutreachRow {
    id: Uuid,
    lead_id: Uuid,
    campaign_id: Uuid,
    to_email: String,
    subject: String,
    body_html: String,
    tracking_token: String,
    ai_generated: bool,
    attachment_paths: Json<Vec<String>>,
    status: String,
    sent_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    bounce_reason: Option<String>,
    provider_message_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OutreachRow> for Outreach {
    type Error = RepositoryError;

    fn try_from(row: OutreachRow) -> Result<Self, Self::Error> {
        Ok(Outreach {
            id: row.id,
            lead_id: row.lead_id,
            campaign_id: row.campaign_id,
            to_email: row.to_email,
            subject: row.subject,
            body_html: row.body_html,
            tracking_token: row.tracking_token,
            ai_generated: row.ai_generated,
            attachment_paths: row.attachment_paths.0,
            status: row.status.parse()?,
            sent_at: row.sent_at,
            delivered_at: row.delivered_at,
            bounce_reason: row.bounce_reason,
            provider_message_id: row.provider_message_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SearchRow {
    id: Uuid,
    city: String,
    category: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MetricsRow {
    leads_discovered: i64,
    leads_qualified: i64,
    emails_sent: i64,
    emails_opened: i64,
    links_clicked: i64,
    replies_received: i64,
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>, RepositoryError>
where
    T: TryFrom<R, Error = RepositoryError>,
{
    rows.into_iter().map(T::try_from).collect()
}

async fn write_lead<'e, E>(executor: E, lead: &Lead) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE leads SET
            business_name = $2, category = $3, address = $4, city = $5, phone = $6,
            email = $7, website_url = $8, google_maps_url = $9, rating = $10,
            review_count = $11, qualification_score = $12, has_website = $13,
            has_social_media = $14, web_presence_notes = $15, status = $16,
            qualified_at = $17, email_sent_at = $18, first_opened_at = $19,
            first_clicked_at = $20, first_replied_at = $21, notes = $22,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(lead.id)
    .bind(&lead.business_name)
    .bind(&lead.category)
    .bind(&lead.address)
    .bind(&lead.city)
    .bind(&lead.phone)
    .bind(&lead.email)
    .bind(&lead.website_url)
    .bind(&lead.google_maps_url)
    .bind(lead.rating)
    .bind(lead.review_count)
    .bind(lead.qualification_score)
    .bind(lead.has_website)
    .bind(lead.has_social_media)
    .bind(&lead.web_presence_notes)
    .bind(lead.status.label())
    .bind(lead.qualified_at)
    .bind(lead.email_sent_at)
    .bind(lead.first_opened_at)
    .bind(lead.first_clicked_at)
    .bind(lead.first_replied_at)
    .bind(&lead.notes)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

async fn write_outreach<'e, E>(executor: E, outreach: &Outreach) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE email_outreach SET
            subject = $2, body_html = $3, attachment_paths = $4, status = $5,
            sent_at = $6, delivered_at = $7, bounce_reason = $8, provider_message_id = $9
        WHERE id = $1
        "#,
    )
    .bind(outreach.id)
    .bind(&outreach.subject)
    .bind(&outreach.body_html)
    .bind(Json(&outreach.attachment_paths))
    .bind(outreach.status.label())
    .bind(outreach.sent_at)
    .bind(outreach.delivered_at)
    .bind(&outreach.bounce_reason)
    .bind(&outreach.provider_message_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

async fn insert_event<'e, E>(executor: E, event: &EmailEvent) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO email_events
            (id, lead_id, outreach_id, tracking_token, event_type,
             url_clicked, ip_address, user_agent, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(event.id)
    .bind(event.lead_id)
    .bind(event.outreach_id)
    .bind(&event.tracking_token)
    .bind(event.event_type.label())
    .bind(&event.url_clicked)
    .bind(&event.ip_address)
    .bind(&event.user_agent)
    .bind(event.occurred_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn bump_counter<'e, E>(
    executor: E,
    id: Uuid,
    counter: CampaignCounter,
) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let column = counter.column();
    let sql = format!("UPDATE campaigns SET {column} = {column} + 1 WHERE id = $1");
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected())
}

fn require_row(rows_affected: u64) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn missing_tables(&self) -> Result<Vec<String>, RepositoryError> {
        let required: Vec<String> = REQUIRED_TABLES.iter().map(|name| name.to_string()).collect();
        let present: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = ANY($1)
            "#,
        )
        .bind(&required)
        .fetch_all(&self.pool)
        .await?;

        Ok(required
            .into_iter()
            .filter(|name| !present.contains(name))
            .collect())
    }

    async fn recent_searches(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<SearchHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, SearchRow>(
            "SELECT id, city, category, created_at FROM search_history WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHistoryEntry {
                id: row.id,
                city: row.city,
                category: row.category,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn record_search(&self, city: &str, category: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO search_history (id, city, category) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(city)
            .bind(category)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn place_id_exists(&self, place_id: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM leads WHERE place_id = $1)")
                .bind(place_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM leads WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_lead(&self, lead: NewLead) -> Result<Lead, RepositoryError> {
        let lead = Lead::from_new(lead, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO leads
                (id, place_id, business_name, category, address, city, phone, email,
                 website_url, google_maps_url, rating, review_count, has_website,
                 status, discovered_at, raw_places_data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $15, $15)
            "#,
        )
        .bind(lead.id)
        .bind(&lead.place_id)
        .bind(&lead.business_name)
        .bind(&lead.category)
        .bind(&lead.address)
        .bind(&lead.city)
        .bind(&lead.phone)
        .bind(&lead.email)
        .bind(&lead.website_url)
        .bind(&lead.google_maps_url)
        .bind(lead.rating)
        .bind(lead.review_count)
        .bind(lead.has_website)
        .bind(lead.status.label())
        .bind(lead.discovered_at)
        .bind(&lead.raw_places_data)
        .execute(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn lead(&self, id: Uuid) -> Result<Option<Lead>, RepositoryError> {
        sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Lead::try_from)
            .transpose()
    }

    async fn leads_with_status(&self, status: LeadStatus) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query_as::<_, LeadRow>(
            "SELECT * FROM leads WHERE status = $1 ORDER BY created_at",
        )
        .bind(status.label())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), RepositoryError> {
        require_row(write_lead(&self.pool, lead).await?)
    }

    async fn latest_lead_by_email(&self, email: &str) -> Result<Option<Lead>, RepositoryError> {
        sqlx::query_as::<_, LeadRow>(
            "SELECT * FROM leads WHERE email = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(Lead::try_from)
        .transpose()
    }

    async fn campaign(&self, id: Uuid) -> Result<Option<Campaign>, RepositoryError> {
        sqlx::query_as::<_, CampaignRow>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn campaign_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Campaign>, RepositoryError> {
        sqlx::query_as::<_, CampaignRow>("SELECT * FROM campaigns WHERE campaign_date = $1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .map(Campaign::try_from)
            .transpose()
    }

    async fn insert_campaign(&self, campaign: Campaign) -> Result<Campaign, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, campaign_date, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(campaign.campaign_date)
        .bind(campaign.status.label())
        .bind(campaign.created_at)
        .execute(&self.pool)
        .await?;
        Ok(campaign)
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                name = $2, status = $3, total_leads = $4, emails_sent = $5,
                emails_opened = $6, links_clicked = $7, replies_received = $8,
                started_at = $9, completed_at = $10
            WHERE id = $1
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(campaign.status.label())
        .bind(campaign.total_leads)
        .bind(campaign.emails_sent)
        .bind(campaign.emails_opened)
        .bind(campaign.links_clicked)
        .bind(campaign.replies_received)
        .bind(campaign.started_at)
        .bind(campaign.completed_at)
        .execute(&self.pool)
        .await?;
        require_row(result.rows_affected())
    }

    async fn increment_campaign(
        &self,
        id: Uuid,
        counter: CampaignCounter,
    ) -> Result<(), RepositoryError> {
        require_row(bump_counter(&self.pool, id, counter).await?)
    }

    async fn insert_outreach(&self, outreach: NewOutreach) -> Result<Outreach, RepositoryError> {
        let outreach = Outreach::from_new(outreach, Utc::now());
        sqlx::query(
            r#"
            INSERT INTO email_outreach
                (id, lead_id, campaign_id, to_email, subject, body_html, tracking_token,
                 ai_generated, attachment_paths, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(outreach.id)
        .bind(outreach.lead_id)
        .bind(outreach.campaign_id)
        .bind(&outreach.to_email)
        .bind(&outreach.subject)
        .bind(&outreach.body_html)
        .bind(&outreach.tracking_token)
        .bind(outreach.ai_generated)
        .bind(Json(&outreach.attachment_paths))
        .bind(outreach.status.label())
        .bind(outreach.created_at)
        .execute(&self.pool)
        .await?;
        Ok(outreach)
    }

    async fn outreach_with_status(
        &self,
        status: OutreachStatus,
    ) -> Result<Vec<Outreach>, RepositoryError> {
        let rows = sqlx::query_as::<_, OutreachRow>(
            "SELECT * FROM email_outreach WHERE status = $1 ORDER BY created_at",
        )
        .bind(status.label())
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn outreach_by_token(&self, token: &str) -> Result<Option<Outreach>, RepositoryError> {
        sqlx::query_as::<_, OutreachRow>("SELECT * FROM email_outreach WHERE tracking_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .map(Outreach::try_from)
            .transpose()
    }

    async fn latest_outreach_for_lead(
        &self,
        lead_id: Uuid,
    ) -> Result<Option<Outreach>, RepositoryError> {
        sqlx::query_as::<_, OutreachRow>(
            "SELECT * FROM email_outreach WHERE lead_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Outreach::try_from)
        .transpose()
    }

    async fn update_outreach(&self, outreach: &Outreach) -> Result<(), RepositoryError> {
        require_row(write_outreach(&self.pool, outreach).await?)
    }

    async fn record_engagement(
        &self,
        token: &str,
        hit: EngagementHit,
    ) -> Result<Option<EngagementOutcome>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, OutreachRow>(
            "SELECT * FROM email_outreach WHERE tracking_token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };
        let mut outreach = Outreach::try_from(row)?;

        let Some(row) = sqlx::query_as::<_, LeadRow>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
            .bind(outreach.lead_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let mut lead = Lead::try_from(row)?;

        let effects = apply_engagement(hit.kind, hit.occurred_at, &mut lead, &mut outreach);

        write_lead(&mut *tx, &lead).await?;
        write_outreach(&mut *tx, &outreach).await?;
        for counter in &effects.counters {
            require_row(bump_counter(&mut *tx, outreach.campaign_id, *counter).await?)?;
        }

        let event = EmailEvent::from_new(
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
        );
        insert_event(&mut *tx, &event).await?;

        tx.commit().await?;

        Ok(Some(EngagementOutcome {
            lead_id: lead.id,
            outreach_id: outreach.id,
            campaign_id: outreach.campaign_id,
            kind: hit.kind,
            lead_status: lead.status,
            outreach_status: outreach.status,
            first_engagement: !effects.counters.is_empty(),
        }))
    }

    async fn record_event(&self, event: NewEmailEvent) -> Result<EmailEvent, RepositoryError> {
        let event = EmailEvent::from_new(event, Utc::now());
        insert_event(&self.pool, &event).await?;
        Ok(event)
    }

    async fn apply_delivery_update(
        &self,
        provider_message_id: &str,
        update: &DeliveryUpdate,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, OutreachRow>(
            "SELECT * FROM email_outreach WHERE provider_message_id = $1 FOR UPDATE",
        )
        .bind(provider_message_id)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        let mut changed = 0;
        for row in rows {
            let mut outreach = Outreach::try_from(row)?;
            if apply_delivery(update, now, &mut outreach) {
                changed += write_outreach(&mut *tx, &outreach).await?;
            }
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn day_metrics(&self, window: DayWindow) -> Result<DayMetrics, RepositoryError> {
        let row = sqlx::query_as::<_, MetricsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM leads
                    WHERE discovered_at >= $1 AND discovered_at < $2) AS leads_discovered,
                (SELECT COUNT(*) FROM leads
                    WHERE qualified_at >= $1 AND qualified_at < $2) AS leads_qualified,
                (SELECT COUNT(*) FROM email_outreach
                    WHERE sent_at >= $1 AND sent_at < $2) AS emails_sent,
                (SELECT COUNT(*) FROM email_events
                    WHERE event_type = 'open' AND occurred_at >= $1 AND occurred_at < $2) AS emails_opened,
                (SELECT COUNT(*) FROM email_events
                    WHERE event_type = 'click' AND occurred_at >= $1 AND occurred_at < $2) AS links_clicked,
                (SELECT COUNT(*) FROM leads
                    WHERE first_replied_at >= $1 AND first_replied_at < $2) AS replies_received
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(DayMetrics {
            leads_discovered: row.leads_discovered,
            leads_qualified: row.leads_qualified,
            emails_sent: row.emails_sent,
            emails_opened: row.emails_opened,
            links_clicked: row.links_clicked,
            replies_received: row.replies_received,
        })
    }

    async fn report_leads(&self, window: DayWindow) -> Result<Vec<Lead>, RepositoryError> {
        let engaged: Vec<String> = [
            LeadStatus::EmailSent,
            LeadStatus::Opened,
            LeadStatus::Clicked,
            LeadStatus::Replied,
        ]
        .iter()
        .map(|status| status.label().to_string())
        .collect();

        let rows = sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT * FROM leads
            WHERE (discovered_at >= $1 AND discovered_at < $2) OR status = ANY($3)
            ORDER BY discovered_at
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(&engaged)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn save_daily_report(&self, report: &DailyReport) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO daily_reports
                (report_date, leads_discovered, leads_qualified, emails_sent, emails_opened,
                 links_clicked, replies_received, new_conversions, report_file_path,
                 email_sent_to, pipeline_started_at, pipeline_ended_at, pipeline_status, error_log)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (report_date) DO UPDATE SET
                leads_discovered = EXCLUDED.leads_discovered,
                leads_qualified = EXCLUDED.leads_qualified,
                emails_sent = EXCLUDED.emails_sent,
                emails_opened = EXCLUDED.emails_opened,
                links_clicked = EXCLUDED.links_clicked,
                replies_received = EXCLUDED.replies_received,
                new_conversions = EXCLUDED.new_conversions,
                report_file_path = EXCLUDED.report_file_path,
                email_sent_to = EXCLUDED.email_sent_to,
                pipeline_started_at = EXCLUDED.pipeline_started_at,
                pipeline_ended_at = EXCLUDED.pipeline_ended_at,
                pipeline_status = EXCLUDED.pipeline_status,
                error_log = EXCLUDED.error_log
            "#,
        )
        .bind(report.report_date)
        .bind(report.leads_discovered)
        .bind(report.leads_qualified)
        .bind(report.emails_sent)
        .bind(report.emails_opened)
        .bind(report.links_clicked)
        .bind(report.replies_received)
        .bind(report.new_conversions)
        .bind(&report.report_file_path)
        .bind(&report.email_sent_to)
        .bind(report.pipeline_started_at)
        .bind(report.pipeline_ended_at)
        .bind(&report.pipeline_status)
        .bind(&report.error_log)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Run with `DATABASE_URL` pointing at a disposable server:
/// `cargo test -p leadgen -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::EngagementKind;

    async fn seeded_outreach(store: &PgLeadStore) -> (Lead, Outreach) {
        let mut lead = store
            .insert_lead(NewLead {
                place_id: "p-1".to_string(),
                business_name: "Blue Door Bakery".to_string(),
                email: Some("hello@bluedoor.in".to_string()),
                ..NewLead::default()
            })
            .await
            .expect("lead inserted");
        let campaign = store
            .insert_campaign(Campaign::new(
                "Daily Outreach".to_string(),
                Utc::now().date_naive(),
                Utc::now(),
            ))
            .await
            .expect("campaign inserted");
        let mut outreach = store
            .insert_outreach(NewOutreach {
                lead_id: lead.id,
                campaign_id: campaign.id,
                to_email: "hello@bluedoor.in".to_string(),
                subject: "Hi".to_string(),
                body_html: "<p>Hi</p>".to_string(),
                tracking_token: "tok-1".to_string(),
                ai_generated: true,
                attachment_paths: vec!["/tmp/proposal.html".to_string()],
            })
            .await
            .expect("outreach inserted");
        outreach.status = OutreachStatus::Sent;
        outreach.sent_at = Some(Utc::now());
        outreach.provider_message_id = Some("<msg-1@example.com>".to_string());
        store.update_outreach(&outreach).await.expect("outreach updated");
        lead.status = LeadStatus::EmailSent;
        store.update_lead(&lead).await.expect("lead updated");
        (lead, outreach)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn schema_is_complete_after_migrations(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        store.health_check().await.expect("healthy");
        assert!(store.missing_tables().await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_place_id_is_a_conflict(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let lead = NewLead {
            place_id: "p-1".to_string(),
            business_name: "Blue Door Bakery".to_string(),
            ..NewLead::default()
        };
        store.insert_lead(lead.clone()).await.expect("first insert");
        assert!(matches!(
            store.insert_lead(lead).await,
            Err(RepositoryError::Conflict)
        ));
        assert!(store.place_id_exists("p-1").await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn rows_round_trip_through_status_labels(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let (lead, outreach) = seeded_outreach(&store).await;

        let stored = store.lead(lead.id).await.unwrap().expect("lead stored");
        assert_eq!(stored.status, LeadStatus::EmailSent);
        let stored = store
            .outreach_by_token("tok-1")
            .await
            .unwrap()
            .expect("outreach stored");
        assert_eq!(stored.status, OutreachStatus::Sent);
        assert_eq!(stored.attachment_paths, outreach.attachment_paths);
        assert!(stored.ai_generated);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn unknown_status_label_is_corrupt(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let (lead, _) = seeded_outreach(&store).await;
        sqlx::query("UPDATE leads SET status = 'archived' WHERE id = $1")
            .bind(lead.id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.lead(lead.id).await,
            Err(RepositoryError::Corrupt(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn click_cascade_commits_lead_outreach_counters_and_event(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let (lead, outreach) = seeded_outreach(&store).await;

        let outcome = store
            .record_engagement(
                "tok-1",
                EngagementHit::click("https://bluedoor.in/menu".to_string(), None, None),
            )
            .await
            .unwrap()
            .expect("token known");
        assert_eq!(outcome.kind, EngagementKind::Click);
        assert_eq!(outcome.lead_status, LeadStatus::Clicked);
        assert_eq!(outcome.outreach_status, OutreachStatus::Clicked);

        let lead = store.lead(lead.id).await.unwrap().unwrap();
        assert!(lead.first_opened_at.is_some());
        assert!(lead.first_clicked_at.is_some());
        let campaign = store.campaign(outreach.campaign_id).await.unwrap().unwrap();
        assert_eq!(campaign.emails_opened, 1);
        assert_eq!(campaign.links_clicked, 1);

        let delivered = store
            .apply_delivery_update("<msg-1@example.com>", &DeliveryUpdate::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered, 0);

        let window = DayWindow::local_day(Utc::now(), &Utc);
        let metrics = store.day_metrics(window).await.unwrap();
        assert_eq!(metrics.links_clicked, 1);
        assert_eq!(metrics.emails_sent, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn unknown_token_leaves_no_trace(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let outcome = store
            .record_engagement("missing", EngagementHit::open(None, None))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL"]
    async fn report_leads_include_engaged_leads_from_earlier_days(pool: PgPool) {
        let store = PgLeadStore::from_pool(pool);
        let (engaged, _) = seeded_outreach(&store).await;
        sqlx::query("UPDATE leads SET discovered_at = now() - interval '3 days' WHERE id = $1")
            .bind(engaged.id)
            .execute(store.pool())
            .await
            .unwrap();
        let fresh = store
            .insert_lead(NewLead {
                place_id: "p-2".to_string(),
                business_name: "Green Leaf Cafe".to_string(),
                ..NewLead::default()
            })
            .await
            .unwrap();
        let stale = store
            .insert_lead(NewLead {
                place_id: "p-3".to_string(),
                business_name: "Old Mill Gym".to_string(),
                ..NewLead::default()
            })
            .await
            .unwrap();
        sqlx::query("UPDATE leads SET discovered_at = now() - interval '3 days' WHERE id = $1")
            .bind(stale.id)
            .execute(store.pool())
            .await
            .unwrap();

        let window = DayWindow::local_day(Utc::now(), &Utc);
        let ids: Vec<Uuid> = store
            .report_leads(window)
            .await
            .unwrap()
            .into_iter()
            .map(|lead| lead.id)
            .collect();
        assert_eq!(ids, vec![engaged.id, fresh.id]);
    }
}
