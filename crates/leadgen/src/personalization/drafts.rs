use serde::{Deserialize, Serialize};
use tracing::warn;

use super::llm::LanguageModel;
use crate::leads::Lead;

const DRAFT_TEMPERATURE: f32 = 0.7;
const TARGET_TEMPERATURE: f32 = 0.8;

/// Subject, body and proposal talking points for one lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body_html: String,
    pub benefits: Vec<String>,
    pub ai_generated: bool,
}

impl EmailDraft {
    pub fn fallback(business_name: &str) -> Self {
        Self {
            subject: format!("Enhance {business_name} Digital Presence"),
            body_html: format!(
                "<p>Hello {business_name} team,</p>\
                 <p>We help local businesses like yours reach more customers online with a \
                 modern website and an active social presence. We would love to show you what \
                 that could look like for you.</p>"
            ),
            benefits: vec![
                "Increased visibility".to_string(),
                "Better customer engagement".to_string(),
                "More sales".to_string(),
            ],
            ai_generated: false,
        }
    }
}

#[derive(Deserialize)]
struct DraftPayload {
    subject: Option<String>,
    body_html: Option<String>,
    #[serde(default)]
    benefits: Vec<String>,
}

fn draft_prompt(lead: &Lead) -> String {
    let presence = lead
        .web_presence_notes
        .as_deref()
        .filter(|notes| !notes.is_empty())
        .unwrap_or("No details recorded");
    let rating = lead
        .rating
        .map(|rating| format!("{rating:.1}"))
        .unwrap_or_else(|| "N/A".to_string());
    let reviews = lead
        .review_count
        .map(|count| count.to_string())
        .unwrap_or_else(|| "0".to_string());

    format!(
        "You write short, friendly cold e-mails offering web design and social media services \
         to local businesses.\n\
         Business: {name}\n\
         Category: {category}\n\
         Location: {location}\n\
         Google rating: {rating} from {reviews} reviews\n\
         Current web presence: {presence}\n\n\
         Reply with a JSON object with these keys:\n\
         - \"subject\": a subject line under 60 characters\n\
         - \"body_html\": the e-mail body as simple HTML paragraphs, no greeting signature\n\
         - \"benefits\": exactly three short benefits tailored to this business",
        name = lead.business_name,
        category = lead.category.as_deref().unwrap_or("local business"),
        location = lead.location_label(),
    )
}

/// Asks the model for a personalized draft, falling back to canned copy on any failure.
pub async fn write_email_draft(model: &dyn LanguageModel, lead: &Lead) -> EmailDraft {
    let payload = match model
        .complete_json(&draft_prompt(lead), DRAFT_TEMPERATURE)
        .await
        .and_then(|value| serde_json::from_value::<DraftPayload>(value).map_err(Into::into))
    {
        Ok(payload) => payload,
        Err(err) => {
            warn!(lead_id = %lead.id, error = %err, "draft generation failed, using fallback copy");
            return EmailDraft::fallback(&lead.business_name);
        }
    };

    let fallback = EmailDraft::fallback(&lead.business_name);
    let subject = payload
        .subject
        .filter(|subject| !subject.trim().is_empty())
        .unwrap_or(fallback.subject);
    let Some(body_html) = payload.body_html.filter(|body| !body.trim().is_empty()) else {
        warn!(lead_id = %lead.id, "draft came back without a body, using fallback copy");
        return EmailDraft::fallback(&lead.business_name);
    };
    let mut benefits: Vec<String> = payload
        .benefits
        .into_iter()
        .filter(|benefit| !benefit.trim().is_empty())
        .take(3)
        .collect();
    if benefits.is_empty() {
        benefits = fallback.benefits;
    }

    EmailDraft {
        subject,
        body_html,
        benefits,
        ai_generated: true,
    }
}

/// A city and business category to search in one discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTarget {
    pub city: String,
    pub category: String,
}

impl DailyTarget {
    pub fn new(city: &str, category: &str) -> Self {
        Self {
            city: city.to_string(),
            category: category.to_string(),
        }
    }

    pub fn query(&self) -> String {
        format!("{} in {}", self.category, self.city)
    }

    pub fn fallback() -> Vec<Self> {
        vec![Self::new("Pune", "Gyms"), Self::new("Ahmedabad", "Cafes")]
    }
}

#[derive(Deserialize)]
struct TargetsPayload {
    #[serde(default)]
    targets: Vec<TargetEntry>,
}

#[derive(Deserialize)]
struct TargetEntry {
    #[serde(default)]
    city: String,
    #[serde(default)]
    category: String,
}

fn targets_prompt(region: &str, excluded_cities: &[String], excluded_categories: &[String]) -> String {
    let list = |values: &[String]| {
        if values.is_empty() {
            "none".to_string()
        } else {
            values.join(", ")
        }
    };

    format!(
        "Pick two promising combinations of a city in {region} and a local business category \
         (for example gyms, salons, clinics, cafes, boutiques) whose owners are likely to need \
         a better website or social media presence.\n\
         Do not use these recently searched cities: {cities}.\n\
         Do not use these recently searched categories: {categories}.\n\
         Reply with a JSON object shaped as \
         {{\"targets\": [{{\"city\": \"...\", \"category\": \"...\"}}, {{\"city\": \"...\", \"category\": \"...\"}}]}}",
        cities = list(excluded_cities),
        categories = list(excluded_categories),
    )
}

/// Picks today's search targets, avoiding recent ones; falls back to fixed targets on failure.
pub async fn choose_daily_targets(
    model: &dyn LanguageModel,
    region: &str,
    excluded_cities: &[String],
    excluded_categories: &[String],
) -> Vec<DailyTarget> {
    let prompt = targets_prompt(region, excluded_cities, excluded_categories);
    let payload = model
        .complete_json(&prompt, TARGET_TEMPERATURE)
        .await
        .and_then(|value| serde_json::from_value::<TargetsPayload>(value).map_err(Into::into));

    match payload {
        Ok(payload) => {
            let targets: Vec<DailyTarget> = payload
                .targets
                .into_iter()
                .map(|entry| DailyTarget {
                    city: entry.city.trim().to_string(),
                    category: entry.category.trim().to_string(),
                })
                .collect();
            if targets.is_empty() {
                warn!("model proposed no targets, using fallback targets");
                DailyTarget::fallback()
            } else {
                targets
            }
        }
        Err(err) => {
            warn!(error = %err, "target selection failed, using fallback targets");
            DailyTarget::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::NewLead;
    use crate::personalization::llm::{LlmError, UnconfiguredModel};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: serde_json::Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete_json(
            &self,
            prompt: &str,
            _temperature: f32,
        ) -> Result<serde_json::Value, LlmError> {
            self.prompts
                .lock()
                .expect("prompt mutex poisoned")
                .push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn lead() -> Lead {
        Lead::from_new(
            NewLead {
                place_id: "p".to_string(),
                business_name: "Glow Salon".to_string(),
                category: Some("Salons".to_string()),
                city: Some("Jaipur".to_string()),
                rating: Some(4.3),
                ..NewLead::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn uses_model_draft_when_available() {
        let model = ScriptedModel {
            reply: json!({
                "subject": "A website for Glow Salon",
                "body_html": "<p>Hi there</p>",
                "benefits": ["Online bookings", "Instagram growth", "Google visibility", "Extra"]
            }),
            prompts: Mutex::new(Vec::new()),
        };

        let draft = write_email_draft(&model, &lead()).await;
        assert!(draft.ai_generated);
        assert_eq!(draft.subject, "A website for Glow Salon");
        assert_eq!(draft.benefits.len(), 3);
        let prompts = model.prompts.lock().expect("prompt mutex poisoned");
        assert!(prompts[0].contains("Glow Salon"));
        assert!(prompts[0].contains("Jaipur"));
    }

    #[tokio::test]
    async fn falls_back_when_model_unavailable() {
        let draft = write_email_draft(&UnconfiguredModel, &lead()).await;
        assert!(!draft.ai_generated);
        assert_eq!(draft.subject, "Enhance Glow Salon Digital Presence");
        assert_eq!(draft.benefits[2], "More sales");
    }

    #[tokio::test]
    async fn falls_back_when_body_missing() {
        let model = ScriptedModel {
            reply: json!({ "subject": "Hi" }),
            prompts: Mutex::new(Vec::new()),
        };
        let draft = write_email_draft(&model, &lead()).await;
        assert!(!draft.ai_generated);
    }

    #[tokio::test]
    async fn targets_exclude_recent_searches_in_prompt() {
        let model = ScriptedModel {
            reply: json!({ "targets": [{ "city": " Indore ", "category": "Bakeries" }] }),
            prompts: Mutex::new(Vec::new()),
        };

        let targets = choose_daily_targets(
            &model,
            "India",
            &["Pune".to_string()],
            &["Gyms".to_string()],
        )
        .await;

        assert_eq!(targets, vec![DailyTarget::new("Indore", "Bakeries")]);
        let prompts = model.prompts.lock().expect("prompt mutex poisoned");
        assert!(prompts[0].contains("cities: Pune"));
        assert!(prompts[0].contains("categories: Gyms"));
    }

    #[tokio::test]
    async fn targets_fall_back_on_failure() {
        let targets = choose_daily_targets(&UnconfiguredModel, "India", &[], &[]).await;
        assert_eq!(targets, DailyTarget::fallback());
        assert_eq!(targets[0].query(), "Gyms in Pune");
    }
}
