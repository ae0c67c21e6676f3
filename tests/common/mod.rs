#![allow(dead_code)]

use async_trait::async_trait;
use bridge_relayer::models::relay::{AckEvent, LockEvent};
use bridge_relayer::services::chain::{
    AckEventSource, ChainClientError, LockEventSource, MintClient, PendingMint,
};
use bridge_relayer::services::ledger::TransactionLedger;
use bridge_relayer::services::relay_executor::RelayExecutor;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Set up a migrated in-memory test database
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    // One connection keeps the in-memory database alive for the whole test
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn setup_ledger() -> TransactionLedger {
    let db = setup_test_db().await.expect("Failed to set up test DB");
    TransactionLedger::new(db)
}

/// Scripted behaviour of one `submit_mint` call
#[derive(Debug, Clone)]
pub enum MintBehavior {
    Confirm { tx_hash: String, block_number: u64 },
    FailSubmit(String),
    FailConfirm { tx_hash: String, error: ChainClientError },
    /// Submitted but never confirmed
    Stall { tx_hash: String },
    /// Submission itself never returns
    HangOnSubmit,
}

impl MintBehavior {
    pub fn confirm(tx_hash: &str) -> Self {
        MintBehavior::Confirm {
            tx_hash: tx_hash.to_string(),
            block_number: 100,
        }
    }

    pub fn fail(message: &str) -> Self {
        MintBehavior::FailSubmit(message.to_string())
    }
}

/// One recorded `submit_mint` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCall {
    pub user: String,
    pub amount: String,
    pub origin_hash: [u8; 32],
}

/// Mint client that replays a script, then falls back to a default behaviour
pub struct MockMintClient {
    script: Mutex<VecDeque<MintBehavior>>,
    fallback: MintBehavior,
    confirmations: Mutex<HashMap<String, Result<u64, ChainClientError>>>,
    stalled: Mutex<HashSet<String>>,
    calls: Mutex<Vec<MintCall>>,
}

impl MockMintClient {
    pub fn new(script: Vec<MintBehavior>, fallback: MintBehavior) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            confirmations: Mutex::new(HashMap::new()),
            stalled: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(behavior: MintBehavior) -> Self {
        Self::new(Vec::new(), behavior)
    }

    pub fn calls(&self) -> Vec<MintCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MintClient for MockMintClient {
    async fn submit_mint(
        &self,
        user: &str,
        amount: &str,
        origin_hash: [u8; 32],
    ) -> Result<PendingMint, ChainClientError> {
        self.calls.lock().unwrap().push(MintCall {
            user: user.to_string(),
            amount: amount.to_string(),
            origin_hash,
        });

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match behavior {
            MintBehavior::FailSubmit(message) => Err(ChainClientError::Rpc(message)),
            MintBehavior::Confirm {
                tx_hash,
                block_number,
            } => {
                self.confirmations
                    .lock()
                    .unwrap()
                    .insert(tx_hash.clone(), Ok(block_number));
                Ok(PendingMint { tx_hash })
            }
            MintBehavior::FailConfirm { tx_hash, error } => {
                self.confirmations
                    .lock()
                    .unwrap()
                    .insert(tx_hash.clone(), Err(error));
                Ok(PendingMint { tx_hash })
            }
            MintBehavior::Stall { tx_hash } => {
                self.stalled.lock().unwrap().insert(tx_hash.clone());
                Ok(PendingMint { tx_hash })
            }
            MintBehavior::HangOnSubmit => std::future::pending().await,
        }
    }

    async fn wait_for_confirmation(&self, pending: &PendingMint) -> Result<u64, ChainClientError> {
        let stalled = self.stalled.lock().unwrap().contains(&pending.tx_hash);
        if stalled {
            std::future::pending::<()>().await;
        }

        self.confirmations
            .lock()
            .unwrap()
            .get(&pending.tx_hash)
            .cloned()
            .unwrap_or_else(|| Err(ChainClientError::Rpc("unknown transaction".to_string())))
    }
}

pub fn executor_with(
    ledger: &TransactionLedger,
    mint_client: Arc<MockMintClient>,
    confirmation_timeout: Duration,
) -> Arc<RelayExecutor> {
    Arc::new(RelayExecutor::new(
        ledger.clone(),
        mint_client,
        confirmation_timeout,
    ))
}

/// Event source handing out one pre-made channel; later subscriptions fail
pub struct ChannelLockSource {
    receiver: Mutex<Option<mpsc::Receiver<LockEvent>>>,
}

impl ChannelLockSource {
    pub fn new() -> (mpsc::Sender<LockEvent>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl LockEventSource for ChannelLockSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<LockEvent>, ChainClientError> {
        self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChainClientError::Rpc("subscription closed".to_string()))
    }
}

pub struct ChannelAckSource {
    receiver: Mutex<Option<mpsc::Receiver<AckEvent>>>,
}

impl ChannelAckSource {
    pub fn new() -> (mpsc::Sender<AckEvent>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
            },
        )
    }
}

#[async_trait]
impl AckEventSource for ChannelAckSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<AckEvent>, ChainClientError> {
        self.receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChainClientError::Rpc("subscription closed".to_string()))
    }
}

pub fn lock_event(lock_id: i64, tx_hash: &str) -> LockEvent {
    LockEvent {
        lock_id,
        user: "0x1234567890abcdef".to_string(),
        token_address: "0xabcdef1234567890".to_string(),
        amount: "1000000000000000000".to_string(),
        origin_tx_hash: Some(tx_hash.to_string()),
        block_number: Some(10 + lock_id as u64),
        log_index: Some(0),
    }
}

/// Poll `check` until it returns true or the deadline passes
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
