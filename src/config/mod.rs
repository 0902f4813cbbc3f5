mod file_config;

pub use file_config::{FileConfig, ReportsConfig, SchedulerConfig};

use crate::background_jobs::ExportSettings;
use crate::report::DEFAULT_FILE_PREFIX;
use crate::wallet_store::LedgerCategory;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_METRICS_PORT: u16 = 9092;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub report_file_prefix: Option<String>,
    pub metrics_port: u16,
    pub tick_interval_secs: Option<u64>,
    pub page_size: Option<usize>,
    pub categories: Option<Vec<String>>,
    pub recover_interrupted_exports: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub metrics_port: u16,

    pub reports: ReportSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub report_dir: PathBuf,
    pub file_prefix: String,
    pub export: ExportSettings,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval: Duration,
    pub recover_interrupted_exports: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let reports_file = file.reports.unwrap_or_default();
        let report_dir = reports_file
            .report_dir
            .map(PathBuf::from)
            .or_else(|| cli.report_dir.clone())
            .unwrap_or_else(|| db_dir.join("reports"));
        let file_prefix = reports_file
            .file_prefix
            .or_else(|| cli.report_file_prefix.clone())
            .unwrap_or_else(|| DEFAULT_FILE_PREFIX.to_string());
        if file_prefix.is_empty() || file_prefix.contains(std::path::is_separator) {
            bail!("Invalid report file prefix: {:?}", file_prefix);
        }

        let page_size = reports_file
            .page_size
            .or(cli.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!("page_size must be greater than 0");
        }

        let categories = match reports_file.categories.or_else(|| cli.categories.clone()) {
            Some(names) => parse_categories(&names)?,
            None => LedgerCategory::ALL.to_vec(),
        };

        let scheduler_file = file.scheduler.unwrap_or_default();
        let tick_interval_secs = scheduler_file
            .tick_interval_secs
            .or(cli.tick_interval_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
        if tick_interval_secs == 0 {
            bail!("tick_interval_secs must be greater than 0");
        }
        let recover_interrupted_exports = scheduler_file
            .recover_interrupted_exports
            .unwrap_or(cli.recover_interrupted_exports);

        Ok(Self {
            db_dir,
            metrics_port,
            reports: ReportSettings {
                report_dir,
                file_prefix,
                export: ExportSettings {
                    page_size,
                    categories,
                },
            },
            scheduler: SchedulerSettings {
                tick_interval: Duration::from_secs(tick_interval_secs),
                recover_interrupted_exports,
            },
        })
    }

    pub fn wallet_db_path(&self) -> PathBuf {
        self.db_dir.join("wallet.db")
    }
}

/// Parses category names, keeping the first occurrence of each.
fn parse_categories(names: &[String]) -> Result<Vec<LedgerCategory>> {
    let mut categories = Vec::with_capacity(names.len());
    for name in names {
        let category = match LedgerCategory::parse(name.trim()) {
            Some(category) => category,
            None => bail!("Unknown ledger category: {:?}", name),
        };
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        bail!("At least one ledger category must be included");
    }
    Ok(categories)
}
