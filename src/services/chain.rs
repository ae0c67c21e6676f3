//! Chain client interfaces used by the relay engine
//!
//! The listeners and the executor only see these traits, so they can run
//! against the alloy clients in `evm_client` or against test doubles.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::relay::{AckEvent, LockEvent};

/// Error types for chain client calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainClientError {
    /// RPC or contract call failure; displays the underlying message as is
    Rpc(String),
    /// Transaction mined with a failed status
    Reverted(String),
    /// Confirmation not observed within the given number of seconds
    Timeout(u64),
    /// Submission (nonce, gas and send round-trips) not accepted in time
    SubmitTimeout(u64),
    InvalidInput(String),
}

impl std::fmt::Display for ChainClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainClientError::Rpc(msg) => write!(f, "{}", msg),
            ChainClientError::Reverted(tx_hash) => write!(f, "Transaction {} reverted", tx_hash),
            ChainClientError::Timeout(secs) => {
                write!(f, "Timeout: no confirmation after {}s", secs)
            }
            ChainClientError::SubmitTimeout(secs) => {
                write!(f, "Timeout: mint submission not accepted after {}s", secs)
            }
            ChainClientError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for ChainClientError {}

/// Submitted mint transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMint {
    pub tx_hash: String,
}

/// Mint entrypoint on the destination chain
#[async_trait]
pub trait MintClient: Send + Sync {
    /// Submit `mint(user, amount, origin_hash)` and return its transaction hash
    async fn submit_mint(
        &self,
        user: &str,
        amount: &str,
        origin_hash: [u8; 32],
    ) -> Result<PendingMint, ChainClientError>;

    /// Block until the transaction is mined; returns its block number.
    /// Callers bound this with a timeout.
    async fn wait_for_confirmation(&self, pending: &PendingMint) -> Result<u64, ChainClientError>;
}

/// Stream of `TokenLocked` events from the source chain
#[async_trait]
pub trait LockEventSource: Send + Sync {
    /// Start delivering events. The receiver closing means the subscription
    /// ended and should be re-established.
    async fn subscribe(&self) -> Result<mpsc::Receiver<LockEvent>, ChainClientError>;
}

/// Stream of acknowledgment events from the destination chain
#[async_trait]
pub trait AckEventSource: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<AckEvent>, ChainClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_displays_message_verbatim() {
        let err = ChainClientError::Rpc("Test error".to_string());
        assert_eq!(err.to_string(), "Test error");
    }

    #[test]
    fn test_error_display() {
        assert!(ChainClientError::Timeout(30).to_string().contains("30s"));
        assert!(ChainClientError::SubmitTimeout(30)
            .to_string()
            .starts_with("Timeout: mint submission"));
        assert!(ChainClientError::Reverted("0xdef".to_string()).to_string().contains("reverted"));
        assert!(ChainClientError::InvalidInput("amount".to_string()).to_string().contains("Invalid input"));
    }
}
