use serde::{Deserialize, Serialize};

use super::probe::{SiteReachability, WebPresenceReport};
use crate::leads::Lead;

/// Minimum score a lead needs before outreach is drafted.
pub const QUALIFYING_SCORE: i32 = 50;
pub const HIGH_RATING: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceFactor {
    NoWebsite,
    DomainUnresolved,
    SiteUnreachable,
    SocialLinks,
    HighRating,
    PhoneListed,
}

/// Discrete contribution to a qualification score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: PresenceFactor,
    pub score: i32,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationOutcome {
    pub total_score: i32,
    pub components: Vec<ScoreComponent>,
    pub has_website: bool,
    pub has_social_media: bool,
}

impl QualificationOutcome {
    pub fn meets_threshold(&self) -> bool {
        self.total_score >= QUALIFYING_SCORE
    }

    /// A lead proceeds to outreach only with a qualifying score and an address to write to.
    pub fn qualifies(&self, has_email: bool) -> bool {
        self.meets_threshold() && has_email
    }

    pub fn notes(&self) -> String {
        self.components
            .iter()
            .map(|component| component.notes.as_str())
            .filter(|note| !note.is_empty())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Scores a lead's web presence; weaker presence means a stronger prospect.
pub fn score_presence(lead: &Lead, report: &WebPresenceReport) -> QualificationOutcome {
    let mut components = Vec::new();
    let mut has_social_media = false;

    match &report.reachability {
        SiteReachability::NoWebsite => components.push(ScoreComponent {
            factor: PresenceFactor::NoWebsite,
            score: 40,
            notes: "No website URL found in Places data.".to_string(),
        }),
        SiteReachability::Unresolved => components.push(ScoreComponent {
            factor: PresenceFactor::DomainUnresolved,
            score: 30,
            notes: "Domain does not resolve (NXDOMAIN).".to_string(),
        }),
        SiteReachability::Unreachable { detail } => components.push(ScoreComponent {
            factor: PresenceFactor::SiteUnreachable,
            score: 25,
            notes: format!("Website is unreachable or returns HTTP error ({detail})."),
        }),
        SiteReachability::Reachable { social, .. } => {
            if social.is_empty() {
                components.push(ScoreComponent {
                    factor: PresenceFactor::SocialLinks,
                    score: 10,
                    notes: "No common social media links found.".to_string(),
                });
            } else {
                has_social_media = true;
                let networks = social
                    .iter()
                    .map(|network| network.label())
                    .collect::<Vec<_>>()
                    .join(", ");
                components.push(ScoreComponent {
                    factor: PresenceFactor::SocialLinks,
                    score: 0,
                    notes: format!("Social media: {networks}"),
                });
            }
        }
    }

    if let Some(rating) = lead.rating.filter(|rating| *rating >= HIGH_RATING) {
        components.push(ScoreComponent {
            factor: PresenceFactor::HighRating,
            score: 10,
            notes: format!("High rating ({rating:?} stars) indicates active business."),
        });
    }

    if lead
        .phone
        .as_deref()
        .map(|phone| !phone.trim().is_empty())
        .unwrap_or(false)
    {
        components.push(ScoreComponent {
            factor: PresenceFactor::PhoneListed,
            score: 5,
            notes: "Phone number is available.".to_string(),
        });
    }

    let total_score = components.iter().map(|component| component.score).sum();

    QualificationOutcome {
        total_score,
        components,
        has_website: !matches!(report.reachability, SiteReachability::NoWebsite),
        has_social_media,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::NewLead;
    use crate::qualification::probe::SocialNetwork;
    use chrono::Utc;

    fn lead(rating: Option<f64>, phone: Option<&str>) -> Lead {
        Lead::from_new(
            NewLead {
                place_id: "p".to_string(),
                business_name: "Lotus Yoga".to_string(),
                rating,
                phone: phone.map(str::to_string),
                ..NewLead::default()
            },
            Utc::now(),
        )
    }

    fn report(reachability: SiteReachability) -> WebPresenceReport {
        WebPresenceReport { reachability }
    }

    #[test]
    fn no_website_high_rating_and_phone_reaches_fifty_five() {
        let outcome = score_presence(
            &lead(Some(4.6), Some("098765 43210")),
            &report(SiteReachability::NoWebsite),
        );
        assert_eq!(outcome.total_score, 55);
        assert!(outcome.meets_threshold());
        assert!(outcome.qualifies(true));
        assert!(!outcome.qualifies(false));
        assert!(!outcome.has_website);
        assert_eq!(
            outcome.notes(),
            "No website URL found in Places data. | \
             High rating (4.6 stars) indicates active business. | \
             Phone number is available."
        );
    }

    #[test]
    fn unresolved_domain_with_rating_falls_short() {
        let outcome = score_presence(&lead(Some(4.2), None), &report(SiteReachability::Unresolved));
        assert_eq!(outcome.total_score, 40);
        assert!(!outcome.meets_threshold());
    }

    #[test]
    fn unreachable_site_skips_social_scoring() {
        let outcome = score_presence(
            &lead(Some(4.0), Some("1")),
            &report(SiteReachability::Unreachable {
                detail: "HTTP 503".to_string(),
            }),
        );
        assert_eq!(outcome.total_score, 40);
        assert!(outcome
            .components
            .iter()
            .all(|component| component.factor != PresenceFactor::SocialLinks));
    }

    #[test]
    fn reachable_site_without_social_links_scores_ten() {
        let outcome = score_presence(
            &lead(Some(3.5), None),
            &report(SiteReachability::Reachable {
                status: 200,
                social: Vec::new(),
            }),
        );
        assert_eq!(outcome.total_score, 10);
        assert!(!outcome.has_social_media);
    }

    #[test]
    fn social_links_are_noted_without_points() {
        let outcome = score_presence(
            &lead(None, None),
            &report(SiteReachability::Reachable {
                status: 200,
                social: vec![SocialNetwork::Facebook, SocialNetwork::Instagram],
            }),
        );
        assert_eq!(outcome.total_score, 0);
        assert!(outcome.has_social_media);
        assert_eq!(outcome.notes(), "Social media: Facebook, Instagram");
    }

    #[test]
    fn blank_phone_does_not_count() {
        let outcome = score_presence(&lead(None, Some("  ")), &report(SiteReachability::NoWebsite));
        assert_eq!(outcome.total_score, 40);
    }
}
