use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Test => "test",
            AppEnvironment::Production => "production",
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub places: PlacesConfig,
    pub llm: LlmConfig,
    pub smtp: SmtpConfig,
    pub imap: ImapConfig,
    pub notifications: NotificationConfig,
    pub schedule: ScheduleConfig,
    pub outreach: OutreachConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let public_url = text_or("APP_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();
        let api_key = text_or("API_KEY", "admin-secret-key");

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(&text_or("APP_LOG_FORMAT", "compact"));

        let database = DatabaseConfig {
            url: optional("DATABASE_URL"),
            max_connections: number("DATABASE_MAX_CONNECTIONS", 10)?,
        };
        if database.url.is_none() && environment == AppEnvironment::Production {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let places = PlacesConfig {
            api_key: optional("GOOGLE_PLACES_API_KEY"),
            max_results: number("PLACES_MAX_RESULTS", 20)?,
        };

        let llm = LlmConfig {
            api_key: optional("GROQ_API_KEY"),
            model: text_or("GROQ_MODEL", "llama-3.1-8b-instant"),
            base_url: text_or("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            region: text_or("DISCOVERY_REGION", "India"),
        };

        let smtp = SmtpConfig {
            host: text_or("BREVO_SMTP_HOST", "smtp-relay.brevo.com"),
            port: number("BREVO_SMTP_PORT", 587)?,
            username: optional("BREVO_SMTP_USER"),
            password: optional("BREVO_SMTP_PASSWORD"),
            from_email: text_or("FROM_EMAIL", "noreply@example.com"),
            from_name: text_or("FROM_NAME", "Lead Generation"),
            reply_to: optional("REPLY_TO_EMAIL"),
        };

        let imap = ImapConfig {
            host: text_or("IMAP_HOST", "imap.gmail.com"),
            port: number("IMAP_PORT", 993)?,
            username: optional("IMAP_USER"),
            password: optional("IMAP_PASSWORD"),
        };

        let notifications = NotificationConfig {
            admin_email: optional("ADMIN_EMAIL"),
            telegram_bot_token: optional("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: optional("TELEGRAM_CHAT_ID"),
        };

        let timezone_name = text_or("SCHEDULER_TIMEZONE", "Asia/Kolkata");
        let timezone = Tz::from_str(&timezone_name)
            .map_err(|_| ConfigError::InvalidTimezone(timezone_name.clone()))?;

        let schedule = ScheduleConfig {
            enabled: flag("SCHEDULER_ENABLED", true),
            timezone,
            discovery_hour: hour("DISCOVERY_HOUR", 6)?,
            qualification_hour: hour("QUALIFICATION_HOUR", 7)?,
            personalization_hour: hour("PERSONALIZATION_HOUR", 8)?,
            outreach_hour: hour("OUTREACH_HOUR", 9)?,
            report_hour: hour("REPORT_HOUR", 23)?,
            report_minute: minute("REPORT_MINUTE", 30)?,
            reply_poll_minutes: number("REPLY_POLL_MINUTES", 30)?,
            misfire_grace: Duration::from_secs(number("SCHEDULER_MISFIRE_GRACE_SECONDS", 600)?),
        };

        let outreach = OutreachConfig {
            public_url: public_url.clone(),
            send_interval: Duration::from_secs(number("EMAIL_SEND_INTERVAL_SECONDS", 2)?),
            artifacts_dir: PathBuf::from(text_or("ARTIFACTS_DIR", "tmp")),
            call_to_action_url: optional("OUTREACH_CTA_URL"),
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                public_url,
                api_key,
            },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            database,
            places,
            llm,
            smtp,
            imap,
            notifications,
            schedule,
            outreach,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn text_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn flag(key: &str, default: bool) -> bool {
    match optional(key) {
        Some(value) => matches!(
            value.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

fn number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            key,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

fn hour(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let value = number(key, default)?;
    if value > 23 {
        return Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn minute(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    let value = number(key, default)?;
    if value > 59 {
        return Err(ConfigError::InvalidNumber {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL used inside tracking links.
    pub public_url: String,
    pub api_key: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service falls back to the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct PlacesConfig {
    pub api_key: Option<String>,
    pub max_results: u32,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Country or region the daily discovery targets are drawn from.
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ImapConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub admin_email: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// Trigger times for the daily stages, evaluated in `timezone`.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub timezone: Tz,
    pub discovery_hour: u32,
    pub qualification_hour: u32,
    pub personalization_hour: u32,
    pub outreach_hour: u32,
    pub report_hour: u32,
    pub report_minute: u32,
    pub reply_poll_minutes: u64,
    pub misfire_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct OutreachConfig {
    pub public_url: String,
    pub send_interval: Duration,
    pub artifacts_dir: PathBuf,
    pub call_to_action_url: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidTimezone(String),
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
            ConfigError::InvalidTimezone(value) => {
                write!(f, "SCHEDULER_TIMEZONE '{value}' is not an IANA timezone")
            }
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
