use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::models::relay::RelayStatus;
use crate::models::transaction::{
    ErrorResponse, ListTransactionsQuery, RelayRecordListResponse, RelayRecordResponse,
};
use crate::services::ledger::LedgerError;
use crate::AppState;

const DEFAULT_LIST_LIMIT: u64 = 100;
const MAX_LIST_LIMIT: u64 = 1000;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn database_error(e: LedgerError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// GET /transactions/{lock_id}
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(lock_id): Path<i64>,
) -> Result<Json<RelayRecordResponse>, ApiError> {
    let record = state
        .ledger
        .find_by_lock_id(lock_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Transaction with lockId {} not found", lock_id),
                }),
            )
        })?;

    Ok(Json(record.into()))
}

// GET /transactions?status=failed&limit=50
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<RelayRecordListResponse>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<RelayStatus>().map_err(|e| {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e }))
        })?),
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let transactions: Vec<RelayRecordResponse> = state
        .ledger
        .list(status, limit)
        .await
        .map_err(database_error)?
        .into_iter()
        .map(RelayRecordResponse::from)
        .collect();

    Ok(Json(RelayRecordListResponse {
        count: transactions.len(),
        transactions,
    }))
}
