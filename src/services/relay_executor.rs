//! Relay executor
//!
//! Submits the destination-chain mint for one relay record, waits for the
//! confirmation and writes the outcome to the ledger. Failures are recorded,
//! never returned as errors, so the lock listener and the retry scheduler can
//! call `execute` repeatedly for the same lockId.
//!
//! Both the submission and the confirmation wait are bounded by the
//! executor's timeout, so a stalled destination RPC ends in `failed`.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::models::relay::{derive_origin_hash, RelayRequest, RelayStatus};
use crate::services::chain::{ChainClientError, MintClient};
use crate::services::ledger::{truncate_error, LedgerError, TransactionLedger};

/// Default bound on the confirmation wait (3 minutes)
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 180;

/// Attempts at persisting an outcome before giving up
const OUTCOME_WRITE_ATTEMPTS: u32 = 3;

/// Delay before the first outcome write retry, doubled after each attempt (ms)
const OUTCOME_WRITE_BACKOFF_MS: u64 = 100;

/// Result of one execution attempt, already persisted to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Confirmed {
        dest_tx_hash: String,
        block_number: u64,
    },
    Failed {
        error: String,
    },
}

impl RelayOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, RelayOutcome::Confirmed { .. })
    }
}

pub struct RelayExecutor {
    ledger: TransactionLedger,
    mint_client: Arc<dyn MintClient>,
    confirmation_timeout: Duration,
}

impl RelayExecutor {
    pub fn new(
        ledger: TransactionLedger,
        mint_client: Arc<dyn MintClient>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            mint_client,
            confirmation_timeout,
        }
    }

    /// Mint on the destination chain and record the outcome
    pub async fn execute(&self, request: &RelayRequest) -> RelayOutcome {
        let lock_id = request.lock_id;
        let origin_hash = derive_origin_hash(&request.origin_tx_hash);

        debug!(
            lock_id = lock_id,
            user = %request.user,
            amount = %request.amount,
            origin_hash = %hex::encode(origin_hash),
            "Submitting mint"
        );

        let pending = match timeout(
            self.confirmation_timeout,
            self.mint_client
                .submit_mint(&request.user, &request.amount, origin_hash),
        )
        .await
        {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => return self.record_failure(lock_id, None, &e).await,
            Err(_) => {
                let e = ChainClientError::SubmitTimeout(self.confirmation_timeout.as_secs());
                return self.record_failure(lock_id, None, &e).await;
            }
        };

        info!(lock_id = lock_id, tx_hash = %pending.tx_hash, "Mint transaction submitted");

        let block_number = match timeout(
            self.confirmation_timeout,
            self.mint_client.wait_for_confirmation(&pending),
        )
        .await
        {
            Ok(Ok(block_number)) => block_number,
            Ok(Err(e)) => return self.record_failure(lock_id, Some(&pending.tx_hash), &e).await,
            Err(_) => {
                let e = ChainClientError::Timeout(self.confirmation_timeout.as_secs());
                return self.record_failure(lock_id, Some(&pending.tx_hash), &e).await;
            }
        };

        info!(
            lock_id = lock_id,
            tx_hash = %pending.tx_hash,
            block_number = block_number,
            "Mint transaction confirmed"
        );

        if let Err(e) = self
            .persist_outcome(lock_id, RelayStatus::Success, Some(&pending.tx_hash), None)
            .await
        {
            // Record is left pending and never swept; the mint is on-chain already
            error!(
                lock_id = lock_id,
                dest_tx_hash = %pending.tx_hash,
                error = %e,
                "Confirmed mint could not be recorded, record needs operator attention"
            );
        }

        RelayOutcome::Confirmed {
            dest_tx_hash: pending.tx_hash,
            block_number,
        }
    }

    async fn record_failure(
        &self,
        lock_id: i64,
        dest_tx_hash: Option<&str>,
        cause: &ChainClientError,
    ) -> RelayOutcome {
        let message = truncate_error(&cause.to_string());

        warn!(lock_id = lock_id, error = %message, "Relay attempt failed");

        if let Err(e) = self
            .persist_outcome(lock_id, RelayStatus::Failed, dest_tx_hash, Some(&message))
            .await
        {
            error!(lock_id = lock_id, error = %e, "Failed to record relay failure");
        }

        RelayOutcome::Failed { error: message }
    }

    /// `update_outcome` with a bounded number of attempts and doubling backoff
    async fn persist_outcome(
        &self,
        lock_id: i64,
        status: RelayStatus,
        dest_tx_hash: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut backoff = Duration::from_millis(OUTCOME_WRITE_BACKOFF_MS);
        let mut attempt = 1;

        loop {
            match self
                .ledger
                .update_outcome(lock_id, status, dest_tx_hash, error)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < OUTCOME_WRITE_ATTEMPTS => {
                    warn!(
                        lock_id = lock_id,
                        attempt = attempt,
                        error = %e,
                        "Outcome write failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
