use crate::report::ReportWriter;
use crate::wallet_store::{LedgerCategory, LedgerReader, ReportStatusStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tunables for a single export run.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Upper bound on events per ledger page.
    pub page_size: usize,
    pub categories: Vec<LedgerCategory>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            page_size: 1000,
            categories: LedgerCategory::ALL.to_vec(),
        }
    }
}

/// Context provided to dispatches during execution.
///
/// Contains references to shared resources and a cancellation token
/// for graceful shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Per-user request/status pair.
    pub status_store: Arc<dyn ReportStatusStore>,

    /// Wallet history the reports are built from.
    pub ledger: Arc<dyn LedgerReader>,

    pub report_writer: Arc<dyn ReportWriter>,

    pub settings: ExportSettings,
}

impl JobContext {
    /// Create a new job context with the given dependencies.
    pub fn new(
        cancellation_token: CancellationToken,
        status_store: Arc<dyn ReportStatusStore>,
        ledger: Arc<dyn LedgerReader>,
        report_writer: Arc<dyn ReportWriter>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            cancellation_token,
            status_store,
            ledger,
            report_writer,
            settings,
        }
    }

    /// Same resources, different cancellation token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            ..self.clone()
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
