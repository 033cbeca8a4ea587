use crate::infra::build_runner;
use clap::Args;
use leadgen::config::{AppConfig, ConfigError};
use leadgen::error::AppError;
use leadgen::leads::PgLeadStore;
use leadgen::pipeline::PipelineStage;
use leadgen::telemetry;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Stage to run: discovery, qualification, personalization, outreach,
    /// reply-poll or daily-report
    pub(crate) stage: String,
    /// Log outgoing e-mail instead of sending it
    #[arg(long)]
    pub(crate) dry_run: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PipelineArgs {
    /// Log outgoing e-mail instead of sending it
    #[arg(long)]
    pub(crate) dry_run: bool,
}

fn load_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    Ok(config)
}

pub(crate) async fn init_db() -> Result<(), AppError> {
    let config = load_config()?;
    let url = config
        .database
        .url
        .as_deref()
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;

    let store = PgLeadStore::connect(url, config.database.max_connections).await?;
    store.migrate().await?;
    info!("database schema is up to date");
    println!("Database initialised.");
    Ok(())
}

pub(crate) async fn run_single_stage(args: RunArgs) -> Result<(), AppError> {
    let stage: PipelineStage = args.stage.parse()?;
    let config = load_config()?;
    let runner = build_runner(&config, args.dry_run).await?;

    let summary = runner.run_stage(stage).await?;
    println!(
        "{}: processed {}, advanced {}, skipped {}, failed {}",
        stage.title(),
        summary.processed,
        summary.advanced,
        summary.skipped,
        summary.failed
    );
    Ok(())
}

pub(crate) async fn run_pipeline(args: PipelineArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let runner = build_runner(&config, args.dry_run).await?;

    println!("Running full pipeline{}", if args.dry_run { " (dry run)" } else { "" });
    for (stage, summary) in runner.run_full_pipeline().await? {
        println!(
            "  {:<16} processed {:>3}  advanced {:>3}  skipped {:>3}  failed {:>3}",
            stage.title(),
            summary.processed,
            summary.advanced,
            summary.skipped,
            summary.failed
        );
    }
    Ok(())
}
