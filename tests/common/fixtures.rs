use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use wallet_report_worker::background_jobs::{
    dispatch, DispatchOutcome, ExportSettings, JobContext, JobScheduler,
};
use wallet_report_worker::report::{CsvReportWriter, DEFAULT_FILE_PREFIX};
use wallet_report_worker::wallet_store::{
    ConfirmationState, LedgerCategory, NewLedgerEvent, ReportRequest, ReportState,
    ReportStatusStore, SqliteWalletStore, UserId, WalletStore,
};

pub struct TestWorker {
    pub store: Arc<SqliteWalletStore>,
    pub report_dir: PathBuf,
    pub settings: ExportSettings,
    pub db_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestWorker {
    pub fn new() -> Self {
        Self::with_settings(ExportSettings::default())
    }

    pub fn with_settings(settings: ExportSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("wallet.db");
        let store = Arc::new(SqliteWalletStore::new(&db_path).expect("Failed to open store"));
        let report_dir = temp_dir.path().join("reports");

        Self {
            store,
            report_dir,
            settings,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    pub fn context(&self, cancellation_token: CancellationToken) -> JobContext {
        JobContext::new(
            cancellation_token,
            self.store.clone(),
            self.store.clone(),
            Arc::new(CsvReportWriter::new(&self.report_dir, DEFAULT_FILE_PREFIX)),
            self.settings.clone(),
        )
    }

    pub fn scheduler(&self, shutdown_token: CancellationToken) -> JobScheduler {
        JobScheduler::new(
            self.context(shutdown_token.child_token()),
            shutdown_token,
            Duration::from_millis(20),
            true,
        )
    }

    pub fn dispatch(&self, user_id: UserId) -> DispatchOutcome {
        dispatch(&self.context(CancellationToken::new()), user_id)
    }

    pub fn user_with_request(&self, handle: &str) -> UserId {
        let user_id = self.store.create_user(handle).unwrap();
        self.request(user_id);
        user_id
    }

    pub fn request(&self, user_id: UserId) {
        assert!(self
            .store
            .set_report_request(user_id, ReportRequest::FullReport)
            .unwrap());
    }

    pub fn cancel(&self, user_id: UserId) {
        assert!(self
            .store
            .set_report_request(user_id, ReportRequest::NoRequest)
            .unwrap());
    }

    pub fn add_event(
        &self,
        user_id: UserId,
        created_at: i64,
        category: LedgerCategory,
        amount_msats: i64,
        confirmation: Option<ConfirmationState>,
    ) -> i64 {
        self.store
            .add_ledger_event(&NewLedgerEvent {
                user_id,
                created_at,
                category,
                amount_msats,
                fee_msats: 0,
                confirmation,
            })
            .unwrap()
    }

    pub fn state(&self, user_id: UserId) -> ReportState {
        self.store.get_report_state(user_id).unwrap().unwrap()
    }

    pub fn report_path(&self, user_id: UserId) -> PathBuf {
        self.report_dir
            .join(format!("{}_{}.csv", DEFAULT_FILE_PREFIX, user_id))
    }

    pub fn report(&self, user_id: UserId) -> String {
        std::fs::read_to_string(self.report_path(user_id)).expect("Report file missing")
    }
}
