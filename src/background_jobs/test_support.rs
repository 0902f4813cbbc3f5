//! In-memory ledger and writer doubles with fault injection.

use super::context::{ExportSettings, JobContext};
use crate::report::{ReportArtifact, ReportRow, ReportSink, ReportWriter};
use crate::wallet_store::{
    ConfirmationState, LedgerCategory, LedgerCursor, LedgerEvent, LedgerPage, LedgerReader,
    ReportRequest, ReportStatusStore, SqliteWalletStore, UserId, WalletStore,
};
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub fn event(
    id: i64,
    created_at: i64,
    category: LedgerCategory,
    amount_msats: i64,
    confirmation: Option<ConfirmationState>,
) -> LedgerEvent {
    LedgerEvent {
        id,
        user_id: 1,
        created_at,
        category,
        amount_msats,
        fee_msats: 0,
        confirmation,
    }
}

/// Serves pre-built pages; the cursor is the index of the next page.
pub struct ScriptedLedger {
    pages: Vec<Result<Vec<LedgerEvent>, String>>,
    pub fetches: AtomicUsize,
    after_fetch: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl ScriptedLedger {
    pub fn new(pages: Vec<Result<Vec<LedgerEvent>, String>>) -> Self {
        Self {
            pages,
            fetches: AtomicUsize::new(0),
            after_fetch: None,
        }
    }

    /// Runs `hook` with the page index each time a page is served.
    pub fn with_hook(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.after_fetch = Some(Box::new(hook));
        self
    }
}

impl LedgerReader for ScriptedLedger {
    fn fetch_page(
        &self,
        _user_id: UserId,
        cursor: Option<&LedgerCursor>,
        _categories: &[LedgerCategory],
        _limit: usize,
    ) -> Result<LedgerPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let index = match cursor {
            Some(c) => c.0.parse::<usize>()?,
            None => 0,
        };
        if let Some(hook) = &self.after_fetch {
            hook(index);
        }

        let events = match self.pages.get(index) {
            Some(Ok(events)) => events.clone(),
            Some(Err(message)) => bail!("{}", message),
            None => vec![],
        };
        let next_cursor =
            (index + 1 < self.pages.len()).then(|| LedgerCursor((index + 1).to_string()));
        Ok(LedgerPage {
            events,
            next_cursor,
        })
    }
}

/// Collects rows in memory and counts open/close calls.
#[derive(Default)]
pub struct RecordingWriter {
    pub rows: Arc<Mutex<Vec<ReportRow>>>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub fail_open: bool,
    /// Fails the append with this zero-based row index.
    pub fail_write_at: Option<usize>,
    pub fail_close: bool,
}

impl ReportWriter for RecordingWriter {
    fn open(&self, user_id: UserId) -> Result<Box<dyn ReportSink>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            bail!("report dir is read-only");
        }
        self.rows.lock().unwrap().clear();
        Ok(Box::new(RecordingSink {
            user_id,
            rows: Arc::clone(&self.rows),
            closes: Arc::clone(&self.closes),
            appended: 0,
            fail_write_at: self.fail_write_at,
            fail_close: self.fail_close,
        }))
    }
}

struct RecordingSink {
    user_id: UserId,
    rows: Arc<Mutex<Vec<ReportRow>>>,
    closes: Arc<AtomicUsize>,
    appended: usize,
    fail_write_at: Option<usize>,
    fail_close: bool,
}

impl ReportSink for RecordingSink {
    fn append_row(&mut self, row: &ReportRow) -> Result<()> {
        if self.fail_write_at == Some(self.appended) {
            bail!("disk full");
        }
        self.rows.lock().unwrap().push(row.clone());
        self.appended += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<ReportArtifact> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            bail!("fsync failed");
        }
        Ok(ReportArtifact {
            path: PathBuf::from(format!("memory_{}.csv", self.user_id)),
            rows_written: self.appended as u64,
        })
    }
}

/// A store holding one user who asked for a full report.
pub fn store_with_request() -> (Arc<SqliteWalletStore>, UserId) {
    let store = Arc::new(SqliteWalletStore::in_memory().unwrap());
    let user_id = store.create_user("alice").unwrap();
    store
        .set_report_request(user_id, ReportRequest::FullReport)
        .unwrap();
    (store, user_id)
}

pub fn test_context(
    store: Arc<SqliteWalletStore>,
    ledger: Arc<dyn LedgerReader>,
    writer: Arc<dyn ReportWriter>,
) -> JobContext {
    JobContext::new(
        CancellationToken::new(),
        store as Arc<dyn ReportStatusStore>,
        ledger,
        writer,
        ExportSettings::default(),
    )
}
