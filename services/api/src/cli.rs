use crate::commands::{init_db, run_pipeline, run_single_stage, PipelineArgs, RunArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use leadgen::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "leadgen-api",
    about = "Serve the lead generation tracking API and run the daily outreach pipeline",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and scheduler (default command)
    Serve(ServeArgs),
    /// Apply database migrations
    InitDb,
    /// Run a single pipeline stage now
    Run(RunArgs),
    /// Run discovery through the daily report in one pass
    Pipeline(PipelineArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Serve HTTP only, without the background stage triggers
    #[arg(long)]
    pub(crate) no_scheduler: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::InitDb => init_db().await,
        Command::Run(args) => run_single_stage(args).await,
        Command::Pipeline(args) => run_pipeline(args).await,
    }
}
