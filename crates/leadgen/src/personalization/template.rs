use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::tracking::TrackingToken;

fn href_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"href\s*=\s*["'](https?://[^"']+)["']"#).expect("valid href regex")
    })
}

/// Inputs for one outgoing e-mail body.
#[derive(Debug, Clone)]
pub struct EmailContext<'a> {
    pub business_name: &'a str,
    pub body_html: &'a str,
    pub token: &'a TrackingToken,
    pub public_url: &'a str,
    pub call_to_action_url: Option<&'a str>,
    pub reply_to: Option<&'a str>,
}

/// Routes every absolute `http(s)` link in `body` through the click tracker.
pub fn rewrite_links(body: &str, token: &TrackingToken, public_url: &str) -> String {
    href_pattern()
        .replace_all(body, |captures: &Captures<'_>| {
            format!(
                "href=\"{}\"",
                escape_html(&token.click_url(public_url, &captures[1]))
            )
        })
        .into_owned()
}

pub fn render_outreach_html(context: &EmailContext<'_>) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html><html><body style=\"font-family: Arial, sans-serif; line-height: 1.5; color: #222;\">");
    writeln!(
        html,
        "<p>Hi {} team,</p>",
        escape_html(context.business_name)
    )
    .expect("write greeting");

    html.push_str(&rewrite_links(
        context.body_html,
        context.token,
        context.public_url,
    ));

    if let Some(target) = context.call_to_action_url {
        writeln!(
            html,
            "<p><a href=\"{}\" style=\"display: inline-block; padding: 10px 18px; background: #1a73e8; color: #fff; text-decoration: none; border-radius: 4px;\">See what we can build for you</a></p>",
            escape_html(&context.token.click_url(context.public_url, target))
        )
        .expect("write call to action");
    }

    if let Some(reply_to) = context.reply_to {
        writeln!(
            html,
            "<p>Just reply to this e-mail or write to <a href=\"mailto:{0}\">{0}</a>.</p>",
            escape_html(reply_to)
        )
        .expect("write reply line");
    } else {
        html.push_str("<p>Just reply to this e-mail if you would like to talk.</p>");
    }

    writeln!(
        html,
        "<img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display: none;\">",
        escape_html(&context.token.open_url(context.public_url))
    )
    .expect("write open pixel");
    html.push_str("</body></html>");
    html
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
