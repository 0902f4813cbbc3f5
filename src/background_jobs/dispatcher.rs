use super::context::JobContext;
use super::export_job::ExportJob;
use super::job::{ExportSummary, JobError};
use crate::server::metrics;
use crate::wallet_store::{ReportRequest, ReportState, ReportStatus, UserId};
use tracing::{debug, error, warn};

/// What a dispatch should do for a given request/status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchAction {
    /// No active request: reset a leftover terminal status.
    ClearIdle,
    StartExport,
    /// Running, or finished while the request is still up.
    Nothing,
}

impl DispatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchAction::ClearIdle => "clear_idle",
            DispatchAction::StartExport => "start_export",
            DispatchAction::Nothing => "nothing",
        }
    }
}

pub fn decide(state: ReportState) -> DispatchAction {
    match (state.request, state.status) {
        (ReportRequest::NoRequest, ReportStatus::InProgress) => DispatchAction::Nothing,
        (ReportRequest::NoRequest, _) => DispatchAction::ClearIdle,
        (ReportRequest::FullReport, ReportStatus::NoRequest) => DispatchAction::StartExport,
        (ReportRequest::FullReport, _) => DispatchAction::Nothing,
    }
}

#[derive(Debug)]
pub enum DispatchOutcome {
    /// A stale `Done`/`Failed` was reset to `NoRequest`.
    Cleared,
    /// Nothing to clear.
    Idle,
    Exported(ExportSummary),
    /// The export never started, usually because another dispatch claimed it.
    NotStarted(JobError),
    /// The export ran but its terminal status could not be written.
    Unsettled(JobError),
    Skipped,
    /// The state could not be read; nothing was changed.
    Abandoned,
}

/// Handles one scheduling tick for one user.
///
/// Safe to call while another dispatch for the same user is still running:
/// only the dispatch that wins `begin_export` runs an export.
pub fn dispatch(ctx: &JobContext, user_id: UserId) -> DispatchOutcome {
    let state = match ctx.status_store.get_report_state(user_id) {
        Ok(Some(state)) => state,
        Ok(None) => {
            warn!("Dispatch for unknown user {}", user_id);
            return DispatchOutcome::Abandoned;
        }
        Err(e) => {
            error!("Failed to read report state for user {}: {:#}", user_id, e);
            return DispatchOutcome::Abandoned;
        }
    };

    let action = decide(state);
    metrics::record_dispatch(action.as_str());
    debug!(
        "User {} ({}/{}): {}",
        user_id,
        state.request.as_str(),
        state.status,
        action.as_str()
    );

    match action {
        DispatchAction::ClearIdle => match ctx.status_store.clear_if_idle(user_id) {
            Ok(true) => DispatchOutcome::Cleared,
            Ok(false) => DispatchOutcome::Idle,
            Err(e) => {
                error!("Failed to clear report status for user {}: {:#}", user_id, e);
                DispatchOutcome::Abandoned
            }
        },
        DispatchAction::StartExport => match ExportJob::new(ctx, user_id).run() {
            Ok(summary) => DispatchOutcome::Exported(summary),
            Err(e @ JobError::Unsettled(_)) => DispatchOutcome::Unsettled(e),
            Err(e) => DispatchOutcome::NotStarted(e),
        },
        DispatchAction::Nothing => DispatchOutcome::Skipped,
    }
}
