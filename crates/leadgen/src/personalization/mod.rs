//! LLM-written outreach copy, proposal attachments and the tracked e-mail template.

pub mod drafts;
pub mod llm;
pub mod proposal;
pub mod template;

pub use drafts::{choose_daily_targets, write_email_draft, DailyTarget, EmailDraft};
pub use llm::{GroqClient, LanguageModel, LlmError, UnconfiguredModel};
pub use proposal::{render_proposal, write_proposal, ProposalError};
pub use template::{render_outreach_html, rewrite_links, EmailContext};
