use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;

use super::drafts::EmailDraft;
use super::template::escape_html;
use crate::leads::Lead;

#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    #[error("failed to write proposal {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn proposal_file_name(lead: &Lead) -> String {
    format!("Proposal_{}.html", lead.id)
}

pub fn render_proposal(lead: &Lead, draft: &EmailDraft, issued_on: NaiveDate) -> String {
    let name = escape_html(&lead.business_name);
    let mut html = String::new();
    writeln!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Digital Growth Proposal for {name}</title></head>\
         <body style=\"font-family: Arial, sans-serif; max-width: 720px; margin: 40px auto; color: #222;\">"
    )
    .expect("write proposal head");
    writeln!(html, "<h1>Digital Growth Proposal</h1>").expect("write title");
    writeln!(
        html,
        "<p><strong>Prepared for:</strong> {name}<br><strong>Location:</strong> {}<br><strong>Date:</strong> {}</p>",
        escape_html(&lead.location_label()),
        issued_on.format("%B %d, %Y")
    )
    .expect("write recipient block");

    html.push_str("<h2>Where you are today</h2>");
    match lead.web_presence_notes.as_deref() {
        Some(notes) if !notes.is_empty() => {
            html.push_str("<ul>");
            for note in notes.split(" | ") {
                writeln!(html, "<li>{}</li>", escape_html(note)).expect("write presence note");
            }
            html.push_str("</ul>");
        }
        _ => html.push_str("<p>Your customers are searching online for businesses like yours.</p>"),
    }

    html.push_str("<h2>What you gain</h2><ol>");
    for benefit in &draft.benefits {
        writeln!(html, "<li>{}</li>", escape_html(benefit)).expect("write benefit");
    }
    html.push_str("</ol>");

    html.push_str(
        "<h2>What we deliver</h2><ul>\
         <li>A fast, mobile-friendly website with your services, photos and contact details</li>\
         <li>Google Business profile and social media setup</li>\
         <li>Monthly updates and simple performance reporting</li></ul>",
    );
    html.push_str("<p>Reply to our e-mail to schedule a free 15 minute consultation.</p></body></html>");
    html
}

/// Writes the proposal under `dir`, creating the directory when needed.
pub async fn write_proposal(
    dir: &Path,
    lead: &Lead,
    draft: &EmailDraft,
    issued_on: NaiveDate,
) -> Result<PathBuf, ProposalError> {
    let path = dir.join(proposal_file_name(lead));
    let write_error = |source| ProposalError::Write {
        path: path.clone(),
        source,
    };

    tokio::fs::create_dir_all(dir).await.map_err(write_error)?;
    tokio::fs::write(&path, render_proposal(lead, draft, issued_on))
        .await
        .map_err(write_error)?;
    debug!(lead_id = %lead.id, path = %path.display(), "proposal written");
    Ok(path)
}
