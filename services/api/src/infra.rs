use leadgen::config::{AppConfig, AppEnvironment};
use leadgen::discovery::{GooglePlacesClient, PlaceSearch, UnconfiguredPlaces};
use leadgen::error::AppError;
use leadgen::leads::{InMemoryLeadStore, LeadStore, PgLeadStore};
use leadgen::notifications::TelegramNotifier;
use leadgen::outreach::{DryRunMailer, Mailer, SmtpMailer};
use leadgen::personalization::{GroqClient, LanguageModel, UnconfiguredModel};
use leadgen::pipeline::{PipelineDeps, PipelineRunner, PipelineSettings};
use leadgen::qualification::HttpSiteInspector;
use leadgen::replies::ImapInbox;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) runner: Arc<PipelineRunner>,
    pub(crate) api_key: Arc<str>,
    pub(crate) environment: AppEnvironment,
}

/// Postgres when `DATABASE_URL` is set, otherwise a process-local store.
pub(crate) async fn build_store(config: &AppConfig) -> Result<Arc<dyn LeadStore>, AppError> {
    match &config.database.url {
        Some(url) => {
            let store = PgLeadStore::connect(url, config.database.max_connections).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory lead store");
            Ok(Arc::new(InMemoryLeadStore::new()))
        }
    }
}

/// Refuses to continue when required tables are absent.
pub(crate) async fn verify_schema(store: &dyn LeadStore) -> Result<(), AppError> {
    let missing = store.missing_tables().await?;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::SchemaMissing(missing))
    }
}

pub(crate) fn build_deps(
    config: &AppConfig,
    store: Arc<dyn LeadStore>,
    dry_run: bool,
) -> Result<PipelineDeps, AppError> {
    let places: Arc<dyn PlaceSearch> = match &config.places.api_key {
        Some(key) => Arc::new(GooglePlacesClient::new(key, config.places.max_results)),
        None => {
            warn!("GOOGLE_PLACES_API_KEY not set, discovery will find nothing");
            Arc::new(UnconfiguredPlaces)
        }
    };

    let model: Arc<dyn LanguageModel> = match &config.llm.api_key {
        Some(key) => Arc::new(
            GroqClient::new(key, &config.llm.model).with_base_url(&config.llm.base_url),
        ),
        None => {
            warn!("GROQ_API_KEY not set, drafts fall back to canned content");
            Arc::new(UnconfiguredModel)
        }
    };

    let mailer: Arc<dyn Mailer> = if dry_run {
        info!("dry run: outgoing e-mail is logged, not sent");
        Arc::new(DryRunMailer::new(&config.smtp.from_email))
    } else {
        Arc::new(SmtpMailer::new(&config.smtp)?)
    };

    Ok(PipelineDeps {
        store,
        places,
        inspector: Arc::new(HttpSiteInspector::new()?),
        model,
        mailer,
        inbox: Arc::new(ImapInbox::new(config.imap.clone())),
        notifier: Arc::new(TelegramNotifier::new(&config.notifications)),
        settings: PipelineSettings::from_config(config),
    })
}

pub(crate) async fn build_runner(
    config: &AppConfig,
    dry_run: bool,
) -> Result<Arc<PipelineRunner>, AppError> {
    let store = build_store(config).await?;
    verify_schema(store.as_ref()).await?;
    let deps = build_deps(config, store, dry_run)?;
    Ok(Arc::new(PipelineRunner::new(deps)))
}
