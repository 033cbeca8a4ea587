use crate::config::ConfigError;
use crate::leads::RepositoryError;
use crate::outreach::MailerError;
use crate::pipeline::{StageError, UnknownStage};
use crate::scheduler::SchedulerError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Database(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    HttpClient(reqwest::Error),
    Repository(RepositoryError),
    /// Required tables are absent; the service refuses to start.
    SchemaMissing(Vec<String>),
    Scheduler(SchedulerError),
    Mailer(MailerError),
    Stage(StageError),
    UnknownStage(UnknownStage),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Database(err) => write!(f, "database error: {}", err),
            AppError::Migrate(err) => write!(f, "migration error: {}", err),
            AppError::HttpClient(err) => write!(f, "http client error: {}", err),
            AppError::Repository(err) => write!(f, "repository error: {}", err),
            AppError::SchemaMissing(tables) => write!(
                f,
                "database schema is missing tables [{}]; run `leadgen-api init-db` first",
                tables.join(", ")
            ),
            AppError::Scheduler(err) => write!(f, "scheduler error: {}", err),
            AppError::Mailer(err) => write!(f, "mailer error: {}", err),
            AppError::Stage(err) => write!(f, "pipeline error: {}", err),
            AppError::UnknownStage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Database(err) => Some(err),
            AppError::Migrate(err) => Some(err),
            AppError::HttpClient(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::SchemaMissing(_) => None,
            AppError::Scheduler(err) => Some(err),
            AppError::Mailer(err) => Some(err),
            AppError::Stage(err) => Some(err),
            AppError::UnknownStage(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::UnknownStage(_) => StatusCode::NOT_FOUND,
            AppError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Database(_)
            | AppError::Migrate(_)
            | AppError::HttpClient(_)
            | AppError::Repository(_)
            | AppError::SchemaMissing(_)
            | AppError::Scheduler(_)
            | AppError::Mailer(_)
            | AppError::Stage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        Self::Database(value)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        Self::Migrate(value)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::HttpClient(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<SchedulerError> for AppError {
    fn from(value: SchedulerError) -> Self {
        Self::Scheduler(value)
    }
}

impl From<MailerError> for AppError {
    fn from(value: MailerError) -> Self {
        Self::Mailer(value)
    }
}

impl From<StageError> for AppError {
    fn from(value: StageError) -> Self {
        Self::Stage(value)
    }
}

impl From<UnknownStage> for AppError {
    fn from(value: UnknownStage) -> Self {
        Self::UnknownStage(value)
    }
}
