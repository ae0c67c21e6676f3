// src/lib.rs

use services::ledger::TransactionLedger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: TransactionLedger,
}

pub mod entities {
    pub mod prelude;
    pub mod listener_checkpoints;
    pub mod transactions;
}

pub mod services {
    pub mod chain;
    pub mod checkpoint;
    pub mod evm_client;
    pub mod ledger;
    pub mod relay_executor;
}

pub mod config;
pub mod handlers;
pub mod jobs;
pub mod models;
