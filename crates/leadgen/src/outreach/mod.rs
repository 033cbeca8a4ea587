//! Outgoing mail transport.

pub mod mailer;

pub use mailer::{
    generate_message_id, DryRunMailer, EmailAttachment, Mailer, MailerError, OutgoingEmail,
    SmtpMailer,
};
