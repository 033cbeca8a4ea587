//! Web-presence qualification: probe a lead's website and score how much it needs help.

pub mod extract;
pub mod probe;
pub mod rubric;

pub use extract::{detect_social_links, extract_contact_email, normalize_url};
pub use probe::{HttpSiteInspector, SiteInspector, SiteReachability, SocialNetwork, WebPresenceReport};
pub use rubric::{score_presence, PresenceFactor, QualificationOutcome, ScoreComponent, QUALIFYING_SCORE};
