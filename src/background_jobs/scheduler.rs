use super::context::JobContext;
use super::dispatcher::{dispatch, DispatchOutcome};
use crate::wallet_store::UserId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Drives report dispatches on a fixed tick.
///
/// Each tick lists the users that need attention and runs one dispatch per
/// user on the blocking pool. A user already being dispatched by this
/// process is skipped until that dispatch returns.
pub struct JobScheduler {
    /// Users with a dispatch in flight, shared with the dispatch tasks.
    running_users: Arc<RwLock<HashSet<UserId>>>,

    /// Task handles of in-flight dispatches (managed by the scheduler loop).
    running_handles: HashMap<UserId, JoinHandle<()>>,

    /// Cancellation tokens for each in-flight dispatch.
    job_cancel_tokens: HashMap<UserId, CancellationToken>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context; each dispatch gets a copy with its own child token.
    job_context: JobContext,

    tick_interval: Duration,

    /// Flip rows left `InProgress` by a previous process to `Failed` on start.
    recover_on_startup: bool,
}

impl JobScheduler {
    pub fn new(
        job_context: JobContext,
        shutdown_token: CancellationToken,
        tick_interval: Duration,
        recover_on_startup: bool,
    ) -> Self {
        Self {
            running_users: Arc::new(RwLock::new(HashSet::new())),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
            job_context,
            tick_interval,
            recover_on_startup,
        }
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        info!(
            "Starting report scheduler (tick every {:?})",
            self.tick_interval
        );

        if self.recover_on_startup {
            self.recover_interrupted_exports();
        }

        loop {
            // Clean up completed dispatch handles
            self.cleanup_completed().await;

            if self.shutdown_token.is_cancelled() {
                self.shutdown().await;
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Report scheduler stopped");
    }

    /// Assumes this is the only worker on the database, so every `InProgress`
    /// row is a leftover.
    fn recover_interrupted_exports(&self) {
        match self.job_context.status_store.recover_interrupted_exports() {
            Ok(count) if count > 0 => {
                info!(
                    "Marked {} interrupted exports as failed from previous run",
                    count
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to recover interrupted exports: {:#}", e);
            }
        }
    }

    /// Dispatches every user that needs attention and is not already in flight.
    pub async fn tick(&mut self) {
        let users = match self.job_context.status_store.list_users_needing_dispatch() {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to list users needing dispatch: {:#}", e);
                return;
            }
        };

        for user_id in users {
            if self.running_users.read().await.contains(&user_id) {
                debug!("Skipping user {}: dispatch already running", user_id);
                continue;
            }
            self.spawn_dispatch(user_id).await;
        }
    }

    async fn spawn_dispatch(&mut self, user_id: UserId) {
        self.running_users.write().await.insert(user_id);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens.insert(user_id, cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);
        let running_users = Arc::clone(&self.running_users);

        // Dispatches are synchronous, so they run on the blocking pool
        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || dispatch(&ctx, user_id)).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(DispatchOutcome::Exported(summary)) => {
                    debug!(
                        "Dispatch for user {} exported {} rows in {:?}",
                        user_id, summary.rows_written, elapsed
                    );
                }
                Ok(DispatchOutcome::NotStarted(e)) => {
                    warn!("Export for user {} did not start: {}", user_id, e);
                }
                Ok(DispatchOutcome::Unsettled(e)) => {
                    error!("Export for user {} is stuck in progress: {}", user_id, e);
                }
                Ok(outcome) => {
                    debug!("Dispatch for user {}: {:?}", user_id, outcome);
                }
                Err(e) => {
                    error!(
                        "Dispatch for user {} panicked after {:?}: {}",
                        user_id, elapsed, e
                    );
                }
            }

            running_users.write().await.remove(&user_id);
        });

        self.running_handles.insert(user_id, handle);
    }

    /// Clean up handles for completed dispatches.
    async fn cleanup_completed(&mut self) {
        let completed: Vec<UserId> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(user_id, _)| *user_id)
            .collect();

        for user_id in completed {
            if let Some(handle) = self.running_handles.remove(&user_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&user_id);
        }
    }

    /// Users with a dispatch in flight.
    pub async fn running_users(&self) -> HashSet<UserId> {
        self.running_users.read().await.clone()
    }

    /// Waits for every in-flight dispatch to return.
    pub async fn wait_for_dispatches(&mut self) {
        for (user_id, handle) in self.running_handles.drain() {
            let _ = handle.await;
            self.job_cancel_tokens.remove(&user_id);
        }
    }

    /// Gracefully shut down the scheduler.
    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (user_id, token) in &self.job_cancel_tokens {
            debug!("Cancelling dispatch for user {}", user_id);
            token.cancel();
        }

        for (user_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!(
                    "Dispatch for user {} did not stop within {:?}",
                    user_id, SHUTDOWN_GRACE
                );
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
