use serde::{Deserialize, Serialize};

use crate::entities::transactions;

/// Relay record as returned by the status API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRecordResponse {
    pub lock_id: i64,
    pub user: String,
    pub token_address: String,
    pub amount: String,
    pub source_tx_hash: String,
    pub origin_hash: String,
    pub dest_tx_hash: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub retry_count: i32,
    pub ack_status: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<transactions::Model> for RelayRecordResponse {
    fn from(model: transactions::Model) -> Self {
        Self {
            lock_id: model.lock_id,
            user: model.user,
            token_address: model.token_address,
            amount: model.amount,
            source_tx_hash: model.source_tx_hash,
            origin_hash: model.origin_hash,
            dest_tx_hash: model.dest_tx_hash,
            status: model.status,
            error: model.error,
            retry_count: model.retry_count,
            ack_status: model.ack_status,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRecordListResponse {
    pub transactions: Vec<RelayRecordResponse>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
