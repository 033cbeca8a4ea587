use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mime::Mime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SmtpConfig;

const PLAIN_TEXT_FALLBACK: &str = "Please enable HTML to view this message.";

/// File attached to an outgoing message; read from disk at send time.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAttachment {
    pub path: PathBuf,
    pub content_type: Mime,
}

impl EmailAttachment {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some("html") | Some("htm") => mime::TEXT_HTML_UTF_8,
            Some("csv") => mime::TEXT_CSV_UTF_8,
            Some("pdf") => mime::APPLICATION_PDF,
            _ => mime::APPLICATION_OCTET_STREAM,
        };
        Self { path, content_type }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid mailbox '{value}': {source}")]
    Address {
        value: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid attachment content type: {0}")]
    ContentType(String),
}

/// Sends one message and returns the Message-ID it was sent with.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError>;
}

fn mailbox(value: &str) -> Result<Mailbox, MailerError> {
    value.parse().map_err(|source| MailerError::Address {
        value: value.to_string(),
        source,
    })
}

/// `<uuid@domain>` using the sender's domain.
pub fn generate_message_id(from_email: &str) -> String {
    let domain = from_email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{}>", Uuid::new_v4(), domain)
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    from_email: String,
    reply_to: Option<Mailbox>,
}

impl SmtpMailer {
    /// STARTTLS on 587, implicit TLS on 465, plain SMTP on any other port.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let builder = match config.port {
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?,
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };
        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        let from = mailbox(&format!("{} <{}>", config.from_name, config.from_email))?;
        let reply_to = config.reply_to.as_deref().map(mailbox).transpose()?;

        Ok(Self {
            transport: builder.build(),
            from,
            from_email: config.from_email.clone(),
            reply_to,
        })
    }

    async fn build_message(
        &self,
        email: &OutgoingEmail,
        message_id: &str,
    ) -> Result<Message, MailerError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(mailbox(&email.to)?)
            .subject(email.subject.clone())
            .message_id(Some(message_id.to_string()));
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        let alternative =
            MultiPart::alternative_plain_html(PLAIN_TEXT_FALLBACK.to_string(), email.html.clone());
        if email.attachments.is_empty() {
            return Ok(builder.multipart(alternative)?);
        }

        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in &email.attachments {
            let bytes = read_attachment(&attachment.path).await?;
            let content_type = ContentType::parse(attachment.content_type.as_ref())
                .map_err(|err| MailerError::ContentType(err.to_string()))?;
            mixed = mixed.singlepart(Attachment::new(attachment.file_name()).body(bytes, content_type));
        }
        Ok(builder.multipart(mixed)?)
    }
}

async fn read_attachment(path: &Path) -> Result<Vec<u8>, MailerError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| MailerError::Attachment {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError> {
        let message_id = generate_message_id(&self.from_email);
        let message = self.build_message(email, &message_id).await?;
        let response = self.transport.send(message).await?;
        debug!(to = %email.to, code = %response.code(), "smtp accepted message");
        Ok(message_id)
    }
}

/// Logs messages instead of sending them; keeps a copy for inspection.
#[derive(Debug, Default)]
pub struct DryRunMailer {
    from_email: String,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl DryRunMailer {
    pub fn new(from_email: &str) -> Self {
        Self {
            from_email: from_email.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("dry-run mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for DryRunMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailerError> {
        for attachment in &email.attachments {
            if !tokio::fs::try_exists(&attachment.path).await.unwrap_or(false) {
                return Err(MailerError::Attachment {
                    path: attachment.path.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
        }

        let message_id = generate_message_id(&self.from_email);
        info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            %message_id,
            "dry run: e-mail not sent"
        );
        self.sent
            .lock()
            .expect("dry-run mutex poisoned")
            .push(email.clone());
        Ok(message_id)
    }
}
