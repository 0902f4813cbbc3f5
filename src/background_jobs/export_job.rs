use super::context::JobContext;
use super::job::{terminal_status, ExportFailure, ExportOutcome, ExportSummary, JobError};
use crate::report::{is_reportable, project, ReportSink};
use crate::server::metrics;
use crate::wallet_store::{LedgerPages, ReportRequest, ReportStatus, UserId};
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct Progress {
    pages: usize,
    rows_written: u64,
    events_skipped: u64,
}

/// One full export of a user's confirmed wallet history.
///
/// The run claims the user with `NoRequest -> InProgress`, streams every
/// ledger page through the projector into a fresh report, and always ends
/// with a single `InProgress -> Done | Failed` transition.
pub struct ExportJob<'a> {
    ctx: &'a JobContext,
    user_id: UserId,
}

impl<'a> ExportJob<'a> {
    pub fn new(ctx: &'a JobContext, user_id: UserId) -> Self {
        Self { ctx, user_id }
    }

    /// Runs the export to completion on the calling thread.
    ///
    /// Returns `JobError::AlreadyRunning` without side effects if the claim
    /// is lost. Once claimed, every failure is reported through the summary's
    /// outcome and terminal status, not as an `Err`, unless the terminal
    /// status itself cannot be written (`JobError::Unsettled`).
    pub fn run(self) -> Result<ExportSummary, JobError> {
        let user_id = self.user_id;
        let store = &self.ctx.status_store;

        match store.begin_export(user_id) {
            Ok(true) => {}
            Ok(false) => {
                return match store.get_report_state(user_id) {
                    Ok(None) => Err(JobError::NotFound),
                    _ => {
                        warn!("Lost export claim for user {}", user_id);
                        Err(JobError::AlreadyRunning)
                    }
                };
            }
            Err(e) => return Err(JobError::Store(format!("{:#}", e))),
        }

        info!("Starting report export for user {}", user_id);
        metrics::export_started();
        let start_time = Instant::now();
        let mut progress = Progress::default();
        let mut report_path = None;

        let outcome = match self.ctx.report_writer.open(user_id) {
            Ok(mut sink) => {
                let outcome = self.write_pages(sink.as_mut(), &mut progress);
                match sink.close() {
                    Ok(artifact) => {
                        report_path = Some(artifact.path);
                        outcome
                    }
                    Err(e) => {
                        error!("Failed to close report for user {}: {:#}", user_id, e);
                        match outcome {
                            ExportOutcome::Completed => {
                                ExportOutcome::Failed(ExportFailure::Close(format!("{:#}", e)))
                            }
                            other => other,
                        }
                    }
                }
            }
            Err(e) => ExportOutcome::Failed(ExportFailure::Open(format!("{:#}", e))),
        };

        let terminal = terminal_status(&outcome);
        let elapsed = start_time.elapsed();
        metrics::record_export(outcome.label(), progress.rows_written, elapsed);
        metrics::export_finished();

        match &outcome {
            ExportOutcome::Failed(failure) => {
                error!("Report export for user {} failed: {}", user_id, failure)
            }
            other => info!(
                "Report export for user {} {} after {:?}: {} rows, {} skipped",
                user_id,
                other.label(),
                elapsed,
                progress.rows_written,
                progress.events_skipped
            ),
        }

        match store.finish_export(user_id, terminal) {
            Ok(true) => {}
            Ok(false) => warn!(
                "Report status for user {} was no longer {} when finishing",
                user_id,
                ReportStatus::InProgress
            ),
            Err(e) => {
                error!(
                    "Failed to record {} for user {}: {:#}",
                    terminal, user_id, e
                );
                return Err(JobError::Unsettled(format!("{:#}", e)));
            }
        }

        Ok(ExportSummary {
            user_id,
            outcome,
            terminal_status: terminal,
            pages: progress.pages,
            rows_written: progress.rows_written,
            events_skipped: progress.events_skipped,
            report_path,
            elapsed,
        })
    }

    fn write_pages(&self, sink: &mut dyn ReportSink, progress: &mut Progress) -> ExportOutcome {
        let settings = &self.ctx.settings;
        let pages = LedgerPages::new(
            self.ctx.ledger.as_ref(),
            self.user_id,
            &settings.categories,
            settings.page_size,
        );

        for page in pages {
            let page_number = progress.pages + 1;
            let events = match page {
                Ok(events) => events,
                Err(e) => {
                    return ExportOutcome::Failed(ExportFailure::Fetch {
                        page: page_number,
                        message: format!("{:#}", e),
                    })
                }
            };
            progress.pages = page_number;

            for event in &events {
                if !is_reportable(event) {
                    progress.events_skipped += 1;
                    continue;
                }
                if let Err(e) = sink.append_row(&project(event)) {
                    return ExportOutcome::Failed(ExportFailure::Write(format!("{:#}", e)));
                }
                progress.rows_written += 1;
            }

            debug!(
                "User {}: wrote page {} ({} events)",
                self.user_id,
                page_number,
                events.len()
            );

            if let Some(stop) = self.check_cancelled() {
                return stop;
            }

            #[cfg(feature = "slowdown")]
            std::thread::sleep(std::time::Duration::from_millis(500));
        }

        ExportOutcome::Completed
    }

    /// Polled after every page: shutdown first, then the user's request.
    fn check_cancelled(&self) -> Option<ExportOutcome> {
        if self.ctx.is_cancelled() {
            info!("Export for user {} interrupted by shutdown", self.user_id);
            return Some(ExportOutcome::Interrupted);
        }

        match self.ctx.status_store.get_report_request(self.user_id) {
            Ok(Some(ReportRequest::FullReport)) => None,
            Ok(_) => {
                info!("Export for user {} cancelled by request", self.user_id);
                Some(ExportOutcome::Cancelled)
            }
            Err(e) => Some(ExportOutcome::Failed(ExportFailure::RequestPoll(format!(
                "{:#}",
                e
            )))),
        }
    }
}
