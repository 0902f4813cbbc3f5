use crate::wallet_store::{ReportStatus, UserId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that keep an export from running at all, or from settling.
#[derive(Debug)]
pub enum JobError {
    NotFound,
    AlreadyRunning,
    Store(String),
    /// The export ran but its terminal status was never written, so the
    /// user stays `InProgress`.
    Unsettled(String),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::NotFound => write!(f, "User not found"),
            JobError::AlreadyRunning => write!(f, "Export is already running"),
            JobError::Store(msg) => write!(f, "Store error: {}", msg),
            JobError::Unsettled(msg) => {
                write!(f, "Export finished but its status was not written: {}", msg)
            }
        }
    }
}

impl std::error::Error for JobError {}

/// Why an export loop stopped early.
#[derive(Debug, Error)]
pub enum ExportFailure {
    #[error("failed to open report: {0}")]
    Open(String),
    #[error("failed to fetch ledger page {page}: {message}")]
    Fetch { page: usize, message: String },
    #[error("failed to write report row: {0}")]
    Write(String),
    #[error("failed to close report: {0}")]
    Close(String),
    #[error("failed to re-read report request: {0}")]
    RequestPoll(String),
}

/// How an export run ended.
#[derive(Debug)]
pub enum ExportOutcome {
    /// Every ledger page was written.
    Completed,
    /// The user withdrew the request mid-run.
    Cancelled,
    /// The worker is shutting down.
    Interrupted,
    Failed(ExportFailure),
}

impl ExportOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ExportOutcome::Completed => "completed",
            ExportOutcome::Cancelled => "cancelled",
            ExportOutcome::Interrupted => "interrupted",
            ExportOutcome::Failed(_) => "failed",
        }
    }
}

/// Status written when an export stops. Only a completed run is `Done`;
/// a cancelled or interrupted run leaves a partial report and is `Failed`.
pub fn terminal_status(outcome: &ExportOutcome) -> ReportStatus {
    match outcome {
        ExportOutcome::Completed => ReportStatus::Done,
        ExportOutcome::Cancelled | ExportOutcome::Interrupted | ExportOutcome::Failed(_) => {
            ReportStatus::Failed
        }
    }
}

/// What an export run did.
#[derive(Debug)]
pub struct ExportSummary {
    pub user_id: UserId,
    pub outcome: ExportOutcome,
    pub terminal_status: ReportStatus,
    pub pages: usize,
    pub rows_written: u64,
    pub events_skipped: u64,
    pub report_path: Option<PathBuf>,
    pub elapsed: Duration,
}
