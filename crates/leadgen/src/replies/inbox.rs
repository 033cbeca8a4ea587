use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailparse::{addrparse, dateparse, parse_headers, MailAddr, MailHeaderMap};
use tracing::{debug, warn};

use crate::config::ImapConfig;

const FETCH_LIMIT: usize = 20;
const IMAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Sender, subject and date of one unread inbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReply {
    pub from_email: String,
    pub subject: String,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("could not reach imap server: {0}")]
    Connect(#[from] io::Error),
    #[error("tls setup failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("tls handshake failed: {0}")]
    Handshake(String),
    #[error("imap failure: {0}")]
    Imap(#[from] imap::Error),
    #[error("inbox worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[async_trait]
pub trait InboxPoller: Send + Sync {
    async fn fetch_unseen(&self) -> Result<Vec<InboundReply>, InboxError>;
}

/// Extracts the reply fields from a raw RFC 822 message.
pub fn parse_reply(raw: &[u8]) -> Option<InboundReply> {
    let (headers, _) = parse_headers(raw).ok()?;
    let from = headers.get_first_value("From")?;
    let from_email = match addrparse(&from).ok()?.iter().next()? {
        MailAddr::Single(info) => info.addr.clone(),
        MailAddr::Group(group) => group.addrs.first()?.addr.clone(),
    };
    let from_email = from_email.trim().to_ascii_lowercase();
    if from_email.is_empty() {
        return None;
    }

    let received_at = headers
        .get_first_value("Date")
        .and_then(|value| dateparse(&value).ok())
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0));

    Some(InboundReply {
        from_email,
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        received_at,
    })
}

/// IMAP over TLS; the blocking client runs on tokio's blocking pool.
pub struct ImapInbox {
    config: ImapConfig,
    timeout: Duration,
}

impl ImapInbox {
    pub fn new(config: ImapConfig) -> Self {
        Self {
            config,
            timeout: IMAP_TIMEOUT,
        }
    }

    /// Bounds connecting and every socket read or write.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn connect_stream(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
    }))
}

fn fetch_blocking(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<Vec<Vec<u8>>, InboxError> {
    let stream = connect_stream(host, port, timeout)?;
    let tls = native_tls::TlsConnector::builder().build()?;
    let tls_stream = tls
        .connect(host, stream)
        .map_err(|err| InboxError::Handshake(err.to_string()))?;
    let mut client = imap::Client::new(tls_stream);
    client.read_greeting()?;
    let mut session = client.login(username, password).map_err(|(err, _)| err)?;
    session.select("INBOX")?;

    let mut ids: Vec<u32> = session.search("UNSEEN")?.into_iter().collect();
    ids.sort_unstable();
    let newest = &ids[ids.len().saturating_sub(FETCH_LIMIT)..];
    if newest.is_empty() {
        session.logout()?;
        return Ok(Vec::new());
    }

    let sequence = newest
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let messages = session.fetch(sequence, "RFC822")?;
    let bodies = messages
        .iter()
        .filter_map(|message| message.body().map(<[u8]>::to_vec))
        .collect();
    session.logout()?;
    Ok(bodies)
}

#[async_trait]
impl InboxPoller for ImapInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboundReply>, InboxError> {
        let Some((username, password)) = self.config.credentials() else {
            warn!("imap credentials not configured, skipping reply poll");
            return Ok(Vec::new());
        };

        let host = self.config.host.clone();
        let port = self.config.port;
        let username = username.to_string();
        let password = password.to_string();
        let timeout = self.timeout;
        let bodies = tokio::task::spawn_blocking(move || {
            fetch_blocking(&host, port, &username, &password, timeout)
        })
        .await??;

        debug!(count = bodies.len(), "fetched unseen messages");
        Ok(bodies.iter().filter_map(|raw| parse_reply(raw)).collect())
    }
}
