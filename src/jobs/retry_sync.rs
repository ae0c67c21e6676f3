//! Retry scheduler job
//!
//! Every interval, re-runs the relay executor for failed, unacknowledged
//! records that still have retries left. `retry_count` is incremented after
//! every attempt whatever its outcome, which caps on-chain submissions per
//! lockId at `max_retries`.
//!
//! Each tick runs in its own task so a stalled tick never delays the timer;
//! a tick that fires while the previous one is still running is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration as TokioDuration, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::models::relay::RelayRequest;
use crate::services::ledger::{LedgerError, TransactionLedger};
use crate::services::relay_executor::RelayExecutor;

/// Statistics from one retry sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetryStats {
    pub candidates: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Records that used their last retry and are still failed
    pub exhausted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryTickOutcome {
    Completed(RetryStats),
    /// Previous tick still running
    Skipped,
}

/// Clears the in-progress flag when a tick ends, including on panic
struct TickGuard(Arc<AtomicBool>);

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct RetryScheduler {
    ledger: TransactionLedger,
    executor: Arc<RelayExecutor>,
    max_retries: i32,
    in_progress: Arc<AtomicBool>,
}

impl RetryScheduler {
    pub fn new(ledger: TransactionLedger, executor: Arc<RelayExecutor>, max_retries: i32) -> Self {
        Self {
            ledger,
            executor,
            max_retries,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one sweep over the retry candidates
    pub async fn run_tick(&self) -> Result<RetryTickOutcome, LedgerError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous retry sweep still running, skipping tick");
            return Ok(RetryTickOutcome::Skipped);
        }
        let _guard = TickGuard(self.in_progress.clone());

        let candidates = self.ledger.find_retry_candidates(self.max_retries).await?;
        let mut stats = RetryStats {
            candidates: candidates.len(),
            ..Default::default()
        };

        for record in &candidates {
            info!(
                lock_id = record.lock_id,
                retry_count = record.retry_count,
                "Retrying transaction"
            );

            let outcome = self.executor.execute(&RelayRequest::from(record)).await;
            if outcome.is_confirmed() {
                stats.confirmed += 1;
            } else {
                stats.failed += 1;
            }

            match self.ledger.increment_retry(record.lock_id).await {
                Ok(retry_count) => {
                    if !outcome.is_confirmed() && retry_count >= self.max_retries {
                        stats.exhausted += 1;
                        warn!(
                            lock_id = record.lock_id,
                            retry_count = retry_count,
                            "Retries exhausted, transaction left failed for operator review"
                        );
                    }
                }
                Err(e) => {
                    error!(lock_id = record.lock_id, error = %e, "Failed to increment retry count");
                }
            }
        }

        Ok(RetryTickOutcome::Completed(stats))
    }
}

/// Start the retry scheduler job
///
/// The first sweep runs one full interval after start-up.
pub fn start_retry_job(scheduler: RetryScheduler, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = TokioDuration::from_secs(interval_secs);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = interval_secs, "Transaction retry job started");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping retry job");
                    break;
                }
                _ = interval.tick() => {
                    let scheduler = scheduler.clone();
                    tokio::spawn(async move {
                        match scheduler.run_tick().await {
                            Ok(RetryTickOutcome::Completed(stats)) => {
                                if stats.candidates > 0 {
                                    info!(
                                        candidates = stats.candidates,
                                        confirmed = stats.confirmed,
                                        failed = stats.failed,
                                        exhausted = stats.exhausted,
                                        "Retry sweep completed"
                                    );
                                }
                            }
                            Ok(RetryTickOutcome::Skipped) => {}
                            Err(e) => {
                                // Next interval will retry
                                error!(error = %e, "Retry sweep failed");
                            }
                        }
                    });
                }
            }
        }

        info!("Transaction retry job stopped");
    })
}
