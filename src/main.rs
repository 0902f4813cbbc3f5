use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wallet_report_worker::background_jobs::{JobContext, JobScheduler};
use wallet_report_worker::config::{AppConfig, CliConfig, FileConfig, DEFAULT_METRICS_PORT};
use wallet_report_worker::report::CsvReportWriter;
use wallet_report_worker::server::{metrics, run_metrics_server};
use wallet_report_worker::wallet_store::SqliteWalletStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the wallet database (wallet.db).
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Where report files are written. Defaults to <db_dir>/reports.
    #[clap(long, value_parser = parse_path)]
    pub report_dir: Option<PathBuf>,

    /// Report file name prefix.
    #[clap(long)]
    pub report_file_prefix: Option<String>,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds between scheduler ticks.
    #[clap(long)]
    pub tick_interval_secs: Option<u64>,

    /// Maximum number of ledger events fetched per page.
    #[clap(long)]
    pub page_size: Option<usize>,

    /// Comma separated ledger categories to include in reports.
    #[clap(long, value_delimiter = ',')]
    pub categories: Option<Vec<String>>,

    /// Mark exports left in progress by a previous run as failed before the
    /// first tick. Only enable when this is the sole worker on the database.
    #[clap(long)]
    pub recover_interrupted_exports: bool,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            report_dir: args.report_dir.clone(),
            report_file_prefix: args.report_file_prefix.clone(),
            metrics_port: args.metrics_port,
            tick_interval_secs: args.tick_interval_secs,
            page_size: args.page_size,
            categories: args.categories.clone(),
            recover_interrupted_exports: args.recover_interrupted_exports,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    metrics::init_metrics();

    info!("Opening wallet database at {:?}", config.wallet_db_path());
    let wallet_store = Arc::new(SqliteWalletStore::new(config.wallet_db_path())?);
    let report_writer = Arc::new(CsvReportWriter::new(
        &config.reports.report_dir,
        config.reports.file_prefix.clone(),
    ));
    info!(
        "Writing reports to {:?} (page size {}, categories {:?})",
        config.reports.report_dir,
        config.reports.export.page_size,
        config.reports.export.categories
    );

    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        wallet_store.clone(),
        wallet_store,
        report_writer,
        config.reports.export.clone(),
    );
    let mut scheduler = JobScheduler::new(
        job_context,
        shutdown_token.clone(),
        config.scheduler.tick_interval,
        config.scheduler.recover_interrupted_exports,
    );

    info!("Metrics available at port {}!", config.metrics_port);
    let metrics_token = shutdown_token.clone();
    let metrics_port = config.metrics_port;
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_port, metrics_token).await {
            error!("Metrics server stopped: {:#}", e);
        }
    });

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    scheduler.run().await;

    shutdown_token.cancel();
    let _ = metrics_task.await;
    info!("Report worker stopped");
    Ok(())
}
