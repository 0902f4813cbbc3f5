mod ledger_pages;
mod models;
mod schema;
mod sqlite_wallet_store;

pub use ledger_pages::LedgerPages;
pub use models::*;
pub use schema::WALLET_VERSIONED_SCHEMAS;
pub use sqlite_wallet_store::SqliteWalletStore;

use anyhow::{bail, Result};

/// Per-user report coordination state.
///
/// Every write touches a single row and is a compare-and-swap on the status
/// column, so concurrent dispatchers for the same user cannot both win.
pub trait ReportStatusStore: Send + Sync {
    /// Returns the request/status pair for the user.
    /// Returns Ok(None) if the user does not exist.
    fn get_report_state(&self, user_id: UserId) -> Result<Option<ReportState>>;

    /// Returns only the request column, used for cancellation polling.
    /// Returns Ok(None) if the user does not exist.
    fn get_report_request(&self, user_id: UserId) -> Result<Option<ReportRequest>>;

    /// Moves the status from `expected` to `next`.
    /// Returns Ok(false) if the stored status was not `expected`.
    /// Returns Err if the state machine does not allow the transition.
    fn transition_status(
        &self,
        user_id: UserId,
        expected: ReportStatus,
        next: ReportStatus,
    ) -> Result<bool>;

    /// Claims the user for an export: `NoRequest -> InProgress`, only while
    /// the request is still `FullReport`.
    /// Returns Ok(false) if another dispatcher got there first or the request
    /// was withdrawn.
    fn begin_export(&self, user_id: UserId) -> Result<bool>;

    /// Releases an export claim with a terminal status.
    fn finish_export(&self, user_id: UserId, terminal: ReportStatus) -> Result<bool> {
        if !terminal.is_terminal() {
            bail!("Cannot finish an export with status {}", terminal);
        }
        self.transition_status(user_id, ReportStatus::InProgress, terminal)
    }

    /// Resets a stale terminal status to `NoRequest` when the user has no
    /// active request. Never touches a running export.
    /// Returns whether a row was changed.
    fn clear_if_idle(&self, user_id: UserId) -> Result<bool>;

    /// Writes the request column. This is the request/cancel surface used by
    /// external actors; the worker never calls it.
    /// Returns Ok(false) if the user does not exist.
    fn set_report_request(&self, user_id: UserId, request: ReportRequest) -> Result<bool>;

    /// Users a dispatch would act on: a request with no export yet, or a
    /// finished export whose request was withdrawn.
    fn list_users_needing_dispatch(&self) -> Result<Vec<UserId>>;

    /// Marks every `InProgress` row as `Failed`.
    /// Only meant to run at startup, before any export can be in flight.
    fn recover_interrupted_exports(&self) -> Result<usize>;
}

/// Paginated, newest-first read access to a user's wallet history.
pub trait LedgerReader: Send + Sync {
    /// Fetches up to `limit` events after `cursor` (or from the newest event
    /// when `cursor` is None), restricted to `categories`.
    fn fetch_page(
        &self,
        user_id: UserId,
        cursor: Option<&LedgerCursor>,
        categories: &[LedgerCategory],
        limit: usize,
    ) -> Result<LedgerPage>;
}

pub trait WalletStore: ReportStatusStore + LedgerReader + Send + Sync {
    /// Creates a new user and returns the user id.
    fn create_user(&self, handle: &str) -> Result<UserId>;

    /// Returns Ok(None) if no user has the given handle.
    fn get_user_id(&self, handle: &str) -> Result<Option<UserId>>;

    /// Appends an event to a user's ledger and returns its id.
    fn add_ledger_event(&self, event: &NewLedgerEvent) -> Result<i64>;
}
