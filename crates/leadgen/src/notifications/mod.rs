//! Operator notifications over Telegram.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NotificationConfig;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification api error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Best-effort operator messages; callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

/// Sends `text` and logs, never propagating a failure.
pub async fn notify_quietly(notifier: &dyn Notifier, text: &str) {
    if let Err(err) = notifier.notify(text).await {
        warn!(error = %err, "notification failed");
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: TELEGRAM_API_URL.to_string(),
            bot_token: config.telegram_bot_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            warn!("telegram not configured, skipping notification");
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let response = self
            .http
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status, body });
        }
        debug!("telegram notification sent");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<String>>,
}

impl MemoryNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_telegram_is_a_no_op() {
        let notifier = TelegramNotifier::new(&NotificationConfig {
            admin_email: None,
            telegram_bot_token: Some("token".to_string()),
            telegram_chat_id: None,
        })
        .with_base_url("http://127.0.0.1:9");

        assert!(notifier.notify("hello").await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_telegram_is_logged_not_raised() {
        let notifier = TelegramNotifier::new(&NotificationConfig {
            admin_email: None,
            telegram_bot_token: Some("token".to_string()),
            telegram_chat_id: Some("42".to_string()),
        })
        .with_base_url("http://127.0.0.1:9");

        assert!(notifier.notify("hello").await.is_err());
        notify_quietly(&notifier, "hello").await;
    }
}
