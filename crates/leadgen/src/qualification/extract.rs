use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::probe::SocialNetwork;

const IGNORED_EMAIL_MARKERS: &[&str] = &["wixpress", "sentry"];
const IMAGE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif"];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
    })
}

fn anchor_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("valid anchor selector"))
}

/// Prefixes `http://` when the URL carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Host portion of a website URL, used for the DNS check.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(&normalize_url(url)).ok()?;
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}

/// First plausible contact address in a page, lowercased.
pub fn extract_contact_email(html: &str) -> Option<String> {
    email_pattern()
        .find_iter(html)
        .map(|found| found.as_str().to_ascii_lowercase())
        .find(|candidate| {
            !IGNORED_EMAIL_MARKERS
                .iter()
                .any(|marker| candidate.contains(marker))
                && !IMAGE_SUFFIXES
                    .iter()
                    .any(|suffix| candidate.ends_with(suffix))
        })
}

/// Social networks linked from the page's anchors, in a stable order.
pub fn detect_social_links(html: &str) -> Vec<SocialNetwork> {
    let document = Html::parse_document(html);
    let mut found = Vec::new();

    for anchor in document.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.to_ascii_lowercase();
        if href.contains("facebook.com") || href.contains("fb.com") {
            found.push(SocialNetwork::Facebook);
        }
        if href.contains("instagram.com") {
            found.push(SocialNetwork::Instagram);
        }
    }

    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_real_contact_address() {
        let html = r#"
            <img src="logo@2x.png">
            <script>var dsn = "abc@o123.ingest.sentry.io";</script>
            <a href="mailto:Bookings@ChaiCorner.in">Write to us</a>
            <p>careers@chaicorner.in</p>
        "#;
        assert_eq!(
            extract_contact_email(html).as_deref(),
            Some("bookings@chaicorner.in")
        );
    }

    #[test]
    fn ignores_builder_addresses() {
        let html = "<p>1234@static.wixpress.com</p>";
        assert_eq!(extract_contact_email(html), None);
    }

    #[test]
    fn finds_facebook_and_instagram_links() {
        let html = r#"
            <a href="https://www.instagram.com/lotusyoga">IG</a>
            <a href="https://fb.com/lotusyoga">FB</a>
            <a href="https://facebook.com/lotusyoga">FB again</a>
            <a href="/contact">Contact</a>
        "#;
        assert_eq!(
            detect_social_links(html),
            vec![SocialNetwork::Facebook, SocialNetwork::Instagram]
        );
    }

    #[test]
    fn page_without_links_has_no_social_presence() {
        assert!(detect_social_links("<html><body>Welcome</body></html>").is_empty());
    }

    #[test]
    fn normalizes_scheme_and_extracts_host() {
        assert_eq!(normalize_url("example.com/menu"), "http://example.com/menu");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(host_of("WWW.Example.com/menu").as_deref(), Some("www.example.com"));
    }
}
