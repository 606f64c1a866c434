use std::sync::Arc;

use clap::{Parser, Subcommand};
use homewatch::{
    config::AppConfig, persistence::sqlite::SqliteStateRepository, supervisor::Supervisor,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing `app.yaml`.
    #[arg(long, global = true, default_value = "configs")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the alert service until SIGINT/SIGTERM.
    Run,
    /// Runs one reconciliation sweep over active conditions and exits.
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    tracing::debug!(config_dir = %cli.config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(&cli.config_dir))?;
    tracing::debug!(
        database_url = %config.database_url,
        interval = ?config.reminders.interval,
        "Configuration loaded."
    );

    match cli.command {
        Commands::Run => run_supervisor(config).await?,
        Commands::Reconcile => reconcile(config).await?,
    }

    Ok(())
}

async fn open_store(
    config: &AppConfig,
) -> Result<Arc<SqliteStateRepository>, Box<dyn std::error::Error>> {
    tracing::debug!("Initializing state store...");
    let repo = SqliteStateRepository::new(&config.database_url).await?;
    repo.run_migrations().await?;
    Ok(Arc::new(repo))
}

async fn run_supervisor(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let repo = open_store(&config).await?;

    let supervisor = Supervisor::builder().config(config).store(repo).build().await?;
    tracing::info!("Supervisor initialized, watching condition flags...");

    supervisor.run().await?;
    Ok(())
}

async fn reconcile(mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.reminders.in_process_timers = false;
    config.server.enabled = false;
    let repo = open_store(&config).await?;

    let supervisor = Supervisor::builder().config(config).store(repo).build().await?;
    let summary = supervisor.reconcile_once().await?;
    tracing::info!(
        scanned = summary.scanned,
        notified = summary.notified,
        failed = summary.failed,
        "Reconciliation sweep complete."
    );
    Ok(())
}
