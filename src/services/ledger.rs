//! Transaction ledger
//!
//! Durable record of every relay attempt, keyed by the source-chain lockId.
//! Every mutation is a single-row `UPDATE ... WHERE lock_id = ?` so a
//! concurrent reader never sees a half-applied write of one call.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::{debug, info};

use crate::entities::{prelude::Transactions, transactions};
use crate::models::relay::{origin_hash_hex, AckStatus, NewRelayRecord, RelayStatus};

/// Maximum length (in characters) of a persisted error message
pub const MAX_ERROR_LEN: usize = 200;

/// Cut `message` down to [`MAX_ERROR_LEN`] characters
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((byte_idx, _)) => message[..byte_idx].to_string(),
        None => message.to_string(),
    }
}

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A record for this lockId already exists
    DuplicateKey(i64),
    NotFound(i64),
    Database(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::DuplicateKey(lock_id) => {
                write!(f, "Duplicate key: lockId {} already recorded", lock_id)
            }
            LedgerError::NotFound(lock_id) => write!(f, "Not found: lockId {}", lock_id),
            LedgerError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<DbErr> for LedgerError {
    fn from(e: DbErr) -> Self {
        LedgerError::Database(e.to_string())
    }
}

#[derive(Clone)]
pub struct TransactionLedger {
    db: DatabaseConnection,
}

impl TransactionLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persist a new pending record. Fails with [`LedgerError::DuplicateKey`]
    /// when the lockId was already recorded; the existing row is left as is.
    pub async fn create(&self, record: NewRelayRecord) -> Result<transactions::Model, LedgerError> {
        let lock_id = record.lock_id;
        let now = Utc::now();

        let model = transactions::ActiveModel {
            lock_id: Set(record.lock_id),
            user: Set(record.user),
            token_address: Set(record.token_address),
            amount: Set(record.amount),
            origin_hash: Set(origin_hash_hex(&record.source_tx_hash)),
            source_tx_hash: Set(record.source_tx_hash),
            dest_tx_hash: Set(None),
            status: Set(RelayStatus::Pending.to_string()),
            error: Set(None),
            retry_count: Set(0),
            ack_status: Set(AckStatus::Unacknowledged.as_i32()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match model.insert(&self.db).await {
            Ok(created) => {
                info!(lock_id = lock_id, "Relay record created");
                Ok(created)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(lock_id = lock_id, "Relay record already exists");
                Err(LedgerError::DuplicateKey(lock_id))
            }
            Err(e) => {
                // Some drivers report the primary key clash without a constraint code
                if self.find_by_lock_id(lock_id).await?.is_some() {
                    return Err(LedgerError::DuplicateKey(lock_id));
                }
                Err(e.into())
            }
        }
    }

    /// Look up a record; `Ok(None)` when absent
    pub async fn find_by_lock_id(
        &self,
        lock_id: i64,
    ) -> Result<Option<transactions::Model>, LedgerError> {
        Ok(Transactions::find_by_id(lock_id).one(&self.db).await?)
    }

    /// Look up a record by the origin-chain transaction key
    pub async fn find_by_source_tx_hash(
        &self,
        source_tx_hash: &str,
    ) -> Result<Option<transactions::Model>, LedgerError> {
        Ok(Transactions::find()
            .filter(transactions::Column::SourceTxHash.eq(source_tx_hash))
            .order_by_asc(transactions::Column::LockId)
            .one(&self.db)
            .await?)
    }

    /// Look up a record by the bytes32 replay key sent with its mint
    pub async fn find_by_origin_hash(
        &self,
        origin_hash: &str,
    ) -> Result<Option<transactions::Model>, LedgerError> {
        Ok(Transactions::find()
            .filter(transactions::Column::OriginHash.eq(origin_hash.to_lowercase()))
            .order_by_asc(transactions::Column::LockId)
            .one(&self.db)
            .await?)
    }

    /// Set the execution outcome. `dest_tx_hash` and `error` are only written
    /// when supplied; the error is truncated to [`MAX_ERROR_LEN`].
    pub async fn update_outcome(
        &self,
        lock_id: i64,
        status: RelayStatus,
        dest_tx_hash: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut update = Transactions::update_many()
            .col_expr(transactions::Column::Status, Expr::value(status.to_string()))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now()));

        if let Some(hash) = dest_tx_hash {
            update = update.col_expr(transactions::Column::DestTxHash, Expr::value(hash.to_string()));
        }
        if let Some(message) = error {
            update = update.col_expr(transactions::Column::Error, Expr::value(truncate_error(message)));
        }

        let result = update
            .filter(transactions::Column::LockId.eq(lock_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(LedgerError::NotFound(lock_id));
        }

        debug!(lock_id = lock_id, status = %status, "Relay outcome updated");
        Ok(())
    }

    /// Set `ack_status` only
    pub async fn update_ack(&self, lock_id: i64, ack: AckStatus) -> Result<(), LedgerError> {
        let result = Transactions::update_many()
            .col_expr(transactions::Column::AckStatus, Expr::value(ack.as_i32()))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now()))
            .filter(transactions::Column::LockId.eq(lock_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(LedgerError::NotFound(lock_id));
        }

        Ok(())
    }

    /// Atomically increment `retry_count` and return the new value
    pub async fn increment_retry(&self, lock_id: i64) -> Result<i32, LedgerError> {
        let result = Transactions::update_many()
            .col_expr(
                transactions::Column::RetryCount,
                Expr::col(transactions::Column::RetryCount).add(1),
            )
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now()))
            .filter(transactions::Column::LockId.eq(lock_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(LedgerError::NotFound(lock_id));
        }

        let record = self
            .find_by_lock_id(lock_id)
            .await?
            .ok_or(LedgerError::NotFound(lock_id))?;

        Ok(record.retry_count)
    }

    /// Failed, unacknowledged records with retries left, by lockId ascending
    pub async fn find_retry_candidates(
        &self,
        max_retries: i32,
    ) -> Result<Vec<transactions::Model>, LedgerError> {
        Ok(Transactions::find()
            .filter(transactions::Column::Status.eq(RelayStatus::Failed.to_string()))
            .filter(transactions::Column::RetryCount.lt(max_retries))
            .filter(transactions::Column::AckStatus.eq(AckStatus::Unacknowledged.as_i32()))
            .order_by_asc(transactions::Column::LockId)
            .all(&self.db)
            .await?)
    }

    /// Records ordered by lockId, optionally restricted to one status
    pub async fn list(
        &self,
        status: Option<RelayStatus>,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, LedgerError> {
        let mut query = Transactions::find();
        if let Some(status) = status {
            query = query.filter(transactions::Column::Status.eq(status.to_string()));
        }

        Ok(query
            .order_by_asc(transactions::Column::LockId)
            .limit(limit)
            .all(&self.db)
            .await?)
    }
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    Utc::now().into()
}
