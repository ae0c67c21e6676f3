mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bridge_relayer::handlers::status_router;
use bridge_relayer::models::relay::{NewRelayRecord, RelayStatus};
use bridge_relayer::services::ledger::TransactionLedger;
use bridge_relayer::AppState;
use serde_json::Value;
use tower::ServiceExt;

use crate::common::setup_ledger;

async fn seeded_ledger() -> TransactionLedger {
    let ledger = setup_ledger().await;

    for lock_id in 1..=3 {
        ledger
            .create(NewRelayRecord {
                lock_id,
                user: "0x1234567890abcdef".to_string(),
                token_address: "0xabcdef1234567890".to_string(),
                amount: "1000000000000000000".to_string(),
                source_tx_hash: format!("0xabc{}", lock_id),
            })
            .await
            .expect("Failed to seed record");
    }

    ledger
        .update_outcome(1, RelayStatus::Success, Some("0xdef"), None)
        .await
        .unwrap();
    ledger
        .update_outcome(2, RelayStatus::Failed, None, Some("Test error"))
        .await
        .unwrap();

    ledger
}

async fn build_test_router() -> Router {
    status_router(AppState {
        ledger: seeded_ledger().await,
    })
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (status, json) = get_json(build_test_router().await, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_get_transaction() {
    let (status, json) = get_json(build_test_router().await, "/transactions/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lockId"], 2);
    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"], "Test error");
    assert_eq!(json["retryCount"], 0);
    assert_eq!(json["ackStatus"], 0);
    assert_eq!(json["sourceTxHash"], "0xabc2");
    assert_eq!(json["originHash"].as_str().unwrap().len(), 66);
    assert!(json["destTxHash"].is_null());
}

#[tokio::test]
async fn test_get_missing_transaction_returns_404() {
    let (status, json) = get_json(build_test_router().await, "/transactions/999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_list_transactions() {
    let (status, json) = get_json(build_test_router().await, "/transactions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 3);

    let ids: Vec<i64> = json["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["lockId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_list_transactions_by_status() {
    let (status, json) =
        get_json(build_test_router().await, "/transactions?status=failed").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["transactions"][0]["lockId"], 2);

    let (_, json) = get_json(build_test_router().await, "/transactions?status=PENDING").await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["transactions"][0]["lockId"], 3);
}

#[tokio::test]
async fn test_list_transactions_with_limit() {
    let (status, json) = get_json(build_test_router().await, "/transactions?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    // Zero is clamped up to one
    let (_, json) = get_json(build_test_router().await, "/transactions?limit=0").await;
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_list_transactions_rejects_unknown_status() {
    let (status, json) =
        get_json(build_test_router().await, "/transactions?status=exploded").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("exploded"));
}
