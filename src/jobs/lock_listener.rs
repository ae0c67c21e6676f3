//! Source-event listener job
//!
//! Handles each `TokenLocked` event as one sequential unit of work:
//! record it in the ledger, then run the relay executor. A lockId that is
//! already recorded is skipped without executing again, which makes
//! subscription replays harmless.
//!
//! The checkpoint only advances past events that reached the ledger. Once an
//! event could not be recorded the checkpoint is held for the rest of the
//! process, so a restart re-delivers it.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::relay::{LockEvent, NewRelayRecord, RelayRequest, RelayStatus};
use crate::services::chain::LockEventSource;
use crate::services::checkpoint::{listeners, CheckpointStore};
use crate::services::ledger::{LedgerError, TransactionLedger};
use crate::services::relay_executor::{RelayExecutor, RelayOutcome};

/// Delay before re-subscribing after the event stream ended or failed
const RESUBSCRIBE_DELAY_SECS: u64 = 5;

/// Attempts at recording one lock event before giving up on it
const CREATE_ATTEMPTS: u32 = 3;

/// Delay before the first create retry, doubled after each attempt (ms)
const CREATE_BACKOFF_MS: u64 = 250;

/// What happened to one lock event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockHandling {
    /// Record created and the executor ran
    Relayed(RelayOutcome),
    /// lockId already recorded; nothing executed
    Duplicate,
    /// Could not record the event
    Failed(String),
}

#[derive(Clone)]
pub struct LockListener {
    ledger: TransactionLedger,
    executor: Arc<RelayExecutor>,
    checkpoints: Option<CheckpointStore>,
}

impl LockListener {
    pub fn new(
        ledger: TransactionLedger,
        executor: Arc<RelayExecutor>,
        checkpoints: Option<CheckpointStore>,
    ) -> Self {
        Self {
            ledger,
            executor,
            checkpoints,
        }
    }

    /// Record the event and relay it. Never returns an error: every failure
    /// is captured in the returned value and, where a record exists, in the ledger.
    pub async fn handle_event(&self, event: LockEvent) -> LockHandling {
        let lock_id = event.lock_id;

        info!(
            lock_id = lock_id,
            user = %event.user,
            token = %event.token_address,
            amount = %event.amount,
            "TokenLocked event detected"
        );

        let source_key = event.source_tx_key();
        if source_key.is_fallback() {
            warn!(
                lock_id = lock_id,
                source_tx_key = %source_key.as_str(),
                "Event carried no transaction hash, using synthesized idempotency key"
            );
        }

        let record = NewRelayRecord {
            lock_id,
            user: event.user,
            token_address: event.token_address,
            amount: event.amount,
            source_tx_hash: source_key.as_str().to_string(),
        };
        let request = RelayRequest::from(&record);

        let mut backoff = Duration::from_millis(CREATE_BACKOFF_MS);
        let mut attempt = 1;

        loop {
            match self.ledger.create(record.clone()).await {
                Ok(_) => break,
                Err(LedgerError::DuplicateKey(_)) => {
                    info!(lock_id = lock_id, "Lock event already processed, skipping");
                    return LockHandling::Duplicate;
                }
                Err(e) if attempt < CREATE_ATTEMPTS => {
                    warn!(
                        lock_id = lock_id,
                        attempt = attempt,
                        error = %e,
                        "Failed to record lock event, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    error!(lock_id = lock_id, error = %e, "Failed to record lock event");
                    self.mark_failed(lock_id, &e.to_string()).await;
                    return LockHandling::Failed(e.to_string());
                }
            }
        }

        LockHandling::Relayed(self.executor.execute(&request).await)
    }

    /// Best effort: flag an existing record as failed so the retry sweep sees it
    async fn mark_failed(&self, lock_id: i64, message: &str) {
        match self
            .ledger
            .update_outcome(lock_id, RelayStatus::Failed, None, Some(message))
            .await
        {
            Ok(()) | Err(LedgerError::NotFound(_)) => {}
            Err(e) => error!(lock_id = lock_id, error = %e, "Failed to mark record as failed"),
        }
    }

    /// Consume events until the process stops. Subscription failures and
    /// closed streams lead to a re-subscribe, never to an exit.
    pub async fn run(&self, source: Arc<dyn LockEventSource>) {
        // Set once an event never reached the ledger
        let mut checkpoint_held = false;

        loop {
            let mut events = match source.subscribe().await {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to TokenLocked events");
                    tokio::time::sleep(Duration::from_secs(RESUBSCRIBE_DELAY_SECS)).await;
                    continue;
                }
            };

            info!("Listening for TokenLocked events");

            while let Some(event) = events.recv().await {
                let lock_id = event.lock_id;
                let block_number = event.block_number;

                match self.handle_event(event).await {
                    LockHandling::Relayed(RelayOutcome::Confirmed { dest_tx_hash, .. }) => {
                        info!(lock_id = lock_id, dest_tx_hash = %dest_tx_hash, "Lock event relayed");
                    }
                    LockHandling::Relayed(RelayOutcome::Failed { error }) => {
                        warn!(lock_id = lock_id, error = %error, "Relay failed, left for retry");
                    }
                    LockHandling::Duplicate => {}
                    LockHandling::Failed(error) => {
                        error!(
                            lock_id = lock_id,
                            block = ?block_number,
                            error = %error,
                            "Lock event not recorded, holding checkpoint until restart"
                        );
                        checkpoint_held = true;
                    }
                }

                if checkpoint_held {
                    continue;
                }

                if let (Some(checkpoints), Some(block)) = (&self.checkpoints, block_number) {
                    if let Err(e) = checkpoints.save(listeners::LOCK_LISTENER, block).await {
                        warn!(block = block, error = %e, "Failed to save lock listener checkpoint");
                    }
                }
            }

            warn!("TokenLocked subscription ended, re-subscribing");
            debug!(delay_secs = RESUBSCRIBE_DELAY_SECS, "Waiting before re-subscribe");
            tokio::time::sleep(Duration::from_secs(RESUBSCRIBE_DELAY_SECS)).await;
        }
    }
}

/// Start the source-event listener job
pub fn start_lock_listener_job(
    listener: LockListener,
    source: Arc<dyn LockEventSource>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Lock listener job started");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping lock listener job");
            }
            _ = listener.run(source) => {}
        }

        info!("Lock listener job stopped");
    })
}
