use super::projector::{format_sats, ReportRow};
use crate::wallet_store::UserId;
use anyhow::{Context, Result};
use csv::{Terminator, WriterBuilder};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CSV_HEADERS: &[&str] = &["time", "type", "sats"];

pub const DEFAULT_FILE_PREFIX: &str = "satistics";

/// A finalized report file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub rows_written: u64,
}

/// Opens one append-only report per export run.
pub trait ReportWriter: Send + Sync {
    /// Creates (or truncates) the report for `user_id` and returns a sink
    /// positioned right after the header.
    fn open(&self, user_id: UserId) -> Result<Box<dyn ReportSink>>;
}

/// An open report. Rows are appended in call order.
pub trait ReportSink: Send {
    fn append_row(&mut self, row: &ReportRow) -> Result<()>;

    /// Flushes and finalizes the report. Consumes the sink, so a report is
    /// closed at most once.
    fn close(self: Box<Self>) -> Result<ReportArtifact>;
}

/// Writes `<report_dir>/<file_prefix>_<user_id>.csv`.
pub struct CsvReportWriter {
    report_dir: PathBuf,
    file_prefix: String,
}

impl CsvReportWriter {
    pub fn new<P: AsRef<Path>>(report_dir: P, file_prefix: impl Into<String>) -> Self {
        Self {
            report_dir: report_dir.as_ref().to_path_buf(),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn report_path(&self, user_id: UserId) -> PathBuf {
        self.report_dir
            .join(format!("{}_{}.csv", self.file_prefix, user_id))
    }
}

impl ReportWriter for CsvReportWriter {
    fn open(&self, user_id: UserId) -> Result<Box<dyn ReportSink>> {
        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!("Failed to create report directory {:?}", self.report_dir)
        })?;

        let path = self.report_path(user_id);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report file {:?}", path))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(file);
        writer
            .write_record(CSV_HEADERS)
            .with_context(|| format!("Failed to write report header to {:?}", path))?;

        debug!("Opened report {:?} for user {}", path, user_id);
        Ok(Box::new(CsvReportSink {
            writer,
            path,
            rows_written: 0,
        }))
    }
}

struct CsvReportSink {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows_written: u64,
}

impl ReportSink for CsvReportSink {
    fn append_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer
            .write_record([
                row.time.to_string(),
                row.category.as_str().to_string(),
                format_sats(row.net_msats),
            ])
            .with_context(|| format!("Failed to append row to {:?}", self.path))?;
        self.rows_written += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<ReportArtifact> {
        let CsvReportSink {
            writer,
            path,
            rows_written,
        } = *self;

        let file = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush report {:?}: {}", path, e.error()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync report {:?}", path))?;

        Ok(ReportArtifact { path, rows_written })
    }
}
