//! Acknowledgment listener job
//!
//! Reconciles destination-chain acknowledgments into `ack_status`. Purely
//! observational: it never touches the relay outcome and never re-mints.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::relay::{AckEvent, AckStatus, AckTarget};
use crate::services::chain::AckEventSource;
use crate::services::checkpoint::{listeners, CheckpointStore};
use crate::services::ledger::{LedgerError, TransactionLedger};

const RESUBSCRIBE_DELAY_SECS: u64 = 5;

/// What happened to one acknowledgment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckHandling {
    Updated { lock_id: i64, ack: AckStatus },
    /// No relay record matches; the event is dropped
    NotFound,
    Failed(String),
}

#[derive(Clone)]
pub struct AckListener {
    ledger: TransactionLedger,
    checkpoints: Option<CheckpointStore>,
}

impl AckListener {
    pub fn new(ledger: TransactionLedger, checkpoints: Option<CheckpointStore>) -> Self {
        Self {
            ledger,
            checkpoints,
        }
    }

    async fn resolve_lock_id(&self, target: &AckTarget) -> Result<Option<i64>, LedgerError> {
        match target {
            AckTarget::LockId(lock_id) => Ok(Some(*lock_id)),
            AckTarget::OriginHash(hash) => {
                // The replay key first, it also covers records with synthesized keys
                if let Some(record) = self.ledger.find_by_origin_hash(hash).await? {
                    return Ok(Some(record.lock_id));
                }
                Ok(self
                    .ledger
                    .find_by_source_tx_hash(hash)
                    .await?
                    .map(|record| record.lock_id))
            }
        }
    }

    pub async fn handle_event(&self, event: AckEvent) -> AckHandling {
        info!(ack_target = ?event.target, success = event.success, "Acknowledgment event detected");

        let lock_id = match self.resolve_lock_id(&event.target).await {
            Ok(Some(lock_id)) => lock_id,
            Ok(None) => {
                info!(ack_target = ?event.target, "No transaction found for acknowledgment");
                return AckHandling::NotFound;
            }
            Err(e) => {
                error!(ack_target = ?event.target, error = %e, "Failed to resolve acknowledgment");
                return AckHandling::Failed(e.to_string());
            }
        };

        let ack = AckStatus::from_success(event.success);

        match self.ledger.update_ack(lock_id, ack).await {
            Ok(()) => {
                info!(lock_id = lock_id, ack_status = ack.as_i32(), "Acknowledgment recorded");
                AckHandling::Updated { lock_id, ack }
            }
            Err(LedgerError::NotFound(_)) => {
                info!(lock_id = lock_id, "No transaction found for acknowledgment");
                AckHandling::NotFound
            }
            Err(e) => {
                error!(lock_id = lock_id, error = %e, "Failed to record acknowledgment");
                AckHandling::Failed(e.to_string())
            }
        }
    }

    /// Consume acknowledgment events until the process stops
    pub async fn run(&self, source: Arc<dyn AckEventSource>) {
        loop {
            let mut events = match source.subscribe().await {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to acknowledgment events");
                    tokio::time::sleep(Duration::from_secs(RESUBSCRIBE_DELAY_SECS)).await;
                    continue;
                }
            };

            info!("Listening for acknowledgment events");

            while let Some(event) = events.recv().await {
                let block_number = event.block_number;
                self.handle_event(event).await;

                if let (Some(checkpoints), Some(block)) = (&self.checkpoints, block_number) {
                    if let Err(e) = checkpoints.save(listeners::ACK_LISTENER, block).await {
                        warn!(block = block, error = %e, "Failed to save ack listener checkpoint");
                    }
                }
            }

            warn!("Acknowledgment subscription ended, re-subscribing");
            tokio::time::sleep(Duration::from_secs(RESUBSCRIBE_DELAY_SECS)).await;
        }
    }
}

/// Start the acknowledgment listener job
pub fn start_ack_listener_job(
    listener: AckListener,
    source: Arc<dyn AckEventSource>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Ack listener job started");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping ack listener job");
            }
            _ = listener.run(source) => {}
        }

        info!("Ack listener job stopped");
    })
}
