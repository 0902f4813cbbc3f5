//! Background report generation.
//!
//! The scheduler ticks, the dispatcher decides per user whether to clear a
//! stale status or start an export, and the export job streams the user's
//! ledger into a report file.

mod context;
mod dispatcher;
mod export_job;
mod job;
mod scheduler;
#[cfg(test)]
mod test_support;

pub use context::{ExportSettings, JobContext};
pub use dispatcher::{decide, dispatch, DispatchAction, DispatchOutcome};
pub use export_job::ExportJob;
pub use job::{terminal_status, ExportFailure, ExportOutcome, ExportSummary, JobError};
pub use scheduler::JobScheduler;
