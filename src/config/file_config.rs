use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub metrics_port: Option<u16>,

    // Feature configs
    pub reports: Option<ReportsConfig>,
    pub scheduler: Option<SchedulerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReportsConfig {
    pub report_dir: Option<String>,
    pub file_prefix: Option<String>,
    pub page_size: Option<usize>,
    /// Ledger categories to include, e.g. `["invoice", "stacked"]`.
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: Option<u64>,
    pub recover_interrupted_exports: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
