//! Relay record status enums and the event/request types flowing between
//! the listeners, the executor and the ledger.

use alloy::primitives::keccak256;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::entities::transactions;

/// Outcome of the relay attempt, as persisted in `transactions.status`
///
/// Status progresses: pending → success
///                            ↘ failed → (retry) → success | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    /// Record created, mint not resolved yet
    Pending,
    /// Mint transaction confirmed on the destination chain
    Success,
    /// Last execution attempt errored; eligible for retry
    Failed,
}

impl std::fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayStatus::Pending => write!(f, "pending"),
            RelayStatus::Success => write!(f, "success"),
            RelayStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RelayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RelayStatus::Pending),
            "success" => Ok(RelayStatus::Success),
            "failed" => Ok(RelayStatus::Failed),
            _ => Err(format!("Unknown relay status: {}", s)),
        }
    }
}

/// Acknowledgment tri-state stored in `transactions.ack_status`.
/// Written only by the acknowledgment listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Unacknowledged,
    Success,
    Failure,
}

impl AckStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            AckStatus::Success
        } else {
            AckStatus::Failure
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            AckStatus::Unacknowledged => 0,
            AckStatus::Success => 1,
            AckStatus::Failure => 2,
        }
    }
}

impl TryFrom<i32> for AckStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AckStatus::Unacknowledged),
            1 => Ok(AckStatus::Success),
            2 => Ok(AckStatus::Failure),
            other => Err(format!("Unknown ack status: {}", other)),
        }
    }
}

/// Decoded `TokenLocked` event from the source chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEvent {
    pub lock_id: i64,
    pub user: String,
    pub token_address: String,
    /// Decimal string, may exceed 64 bits
    pub amount: String,
    /// Hash of the source-chain transaction that emitted the event
    pub origin_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
}

/// Idempotency key stored as `source_tx_hash`, and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTxKey {
    TransactionHash(String),
    /// `block:<n>:log:<i>` when the event carried no transaction hash
    LogPosition(String),
    /// Last resort, not collision free
    WallClock(String),
}

impl SourceTxKey {
    pub fn as_str(&self) -> &str {
        match self {
            SourceTxKey::TransactionHash(key)
            | SourceTxKey::LogPosition(key)
            | SourceTxKey::WallClock(key) => key,
        }
    }

    pub fn is_fallback(&self) -> bool {
        !matches!(self, SourceTxKey::TransactionHash(_))
    }
}

impl LockEvent {
    /// Key identifying the origin transaction, synthesized when the event
    /// payload has no transaction hash.
    pub fn source_tx_key(&self) -> SourceTxKey {
        if let Some(hash) = self.origin_tx_hash.as_deref().filter(|h| !h.is_empty()) {
            return SourceTxKey::TransactionHash(hash.to_string());
        }

        match (self.block_number, self.log_index) {
            (Some(block), Some(log_index)) => {
                SourceTxKey::LogPosition(format!("block:{}:log:{}", block, log_index))
            }
            _ => SourceTxKey::WallClock(format!(
                "local:{}:{}",
                Utc::now().timestamp_millis(),
                self.lock_id
            )),
        }
    }
}

/// Replay-protection key handed to the mint contract.
///
/// A `0x`-prefixed 32-byte hex hash passes through unchanged; anything else
/// (e.g. a synthesized placeholder key) is keccak-256 hashed.
pub fn derive_origin_hash(origin_tx_hash: &str) -> [u8; 32] {
    if let Some(hex_part) = origin_tx_hash.strip_prefix("0x") {
        if hex_part.len() == 64 {
            if let Ok(bytes) = hex::decode(hex_part) {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&bytes);
                return hash;
            }
        }
    }

    keccak256(origin_tx_hash.as_bytes()).0
}

/// [`derive_origin_hash`] as lowercase `0x` hex, the form stored in
/// `transactions.origin_hash` and carried by `TokenMinted` acknowledgments
pub fn origin_hash_hex(origin_tx_hash: &str) -> String {
    format!("0x{}", hex::encode(derive_origin_hash(origin_tx_hash)))
}

/// How an acknowledgment event identifies its relay record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckTarget {
    LockId(i64),
    /// bytes32 replay key from `TokenMinted`, matched against `origin_hash`,
    /// then against `source_tx_hash`
    OriginHash(String),
}

/// Decoded `CrossedSuccess` / `TokenMinted` event from the destination chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEvent {
    pub target: AckTarget,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Fields of a relay record that never change after creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelayRecord {
    pub lock_id: i64,
    pub user: String,
    pub token_address: String,
    pub amount: String,
    pub source_tx_hash: String,
}

/// Parameters of one mint attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub lock_id: i64,
    pub user: String,
    pub token_address: String,
    pub amount: String,
    pub origin_tx_hash: String,
}

impl From<&NewRelayRecord> for RelayRequest {
    fn from(record: &NewRelayRecord) -> Self {
        Self {
            lock_id: record.lock_id,
            user: record.user.clone(),
            token_address: record.token_address.clone(),
            amount: record.amount.clone(),
            origin_tx_hash: record.source_tx_hash.clone(),
        }
    }
}

impl From<&transactions::Model> for RelayRequest {
    fn from(model: &transactions::Model) -> Self {
        Self {
            lock_id: model.lock_id,
            user: model.user.clone(),
            token_address: model.token_address.clone(),
            amount: model.amount.clone(),
            origin_tx_hash: model.source_tx_hash.clone(),
        }
    }
}
