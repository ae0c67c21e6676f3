use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub mod transaction;

/// Read-only operator API over the transaction ledger
pub fn status_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(transaction::health))
        .route("/transactions", get(transaction::list_transactions))
        .route("/transactions/{lock_id}", get(transaction::get_transaction))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
