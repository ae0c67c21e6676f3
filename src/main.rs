use bridge_relayer::{
    config::RelayerConfig,
    handlers::status_router,
    jobs::{
        ack_listener::{start_ack_listener_job, AckListener},
        lock_listener::{start_lock_listener_job, LockListener},
        retry_sync::{start_retry_job, RetryScheduler},
    },
    services::{
        checkpoint::{listeners, CheckpointStore},
        evm_client::{EvmAckEventSource, EvmLockEventSource, EvmMintClient},
        ledger::TransactionLedger,
        relay_executor::RelayExecutor,
    },
    AppState,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    let default_filter = std::env::var("LOG_LEVEL")
        .map(|level| format!("{},bridge_relayer={}", level, level))
        .unwrap_or_else(|_| "info,bridge_relayer=debug".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayerConfig::from_env()?;
    tracing::debug!(?config, "Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let ledger = TransactionLedger::new(db.clone());
    let checkpoints = CheckpointStore::new(db.clone());

    // Resume each listener from its last handled block when one is recorded
    let lock_start = checkpoints
        .load(listeners::LOCK_LISTENER)
        .await?
        .or(config.source_start_block);
    let ack_start = checkpoints
        .load(listeners::ACK_LISTENER)
        .await?
        .or(config.dest_start_block);

    let poll_interval = Duration::from_secs(config.poll_interval_secs);

    let mint_client = EvmMintClient::new(
        &config.dest_rpc_url,
        &config.dest_private_key,
        &config.dest_mint_contract,
    )
    .await?;
    let lock_source = EvmLockEventSource::new(
        &config.source_rpc_url,
        &config.source_bridge_address,
        lock_start,
        poll_interval,
    )
    .await?;
    let ack_source = EvmAckEventSource::new(
        &config.dest_rpc_url,
        &config.dest_ack_contract,
        ack_start,
        poll_interval,
    )
    .await?;

    let executor = Arc::new(RelayExecutor::new(
        ledger.clone(),
        Arc::new(mint_client),
        Duration::from_secs(config.confirmation_timeout_secs),
    ));

    // Start source-chain event listener
    start_lock_listener_job(
        LockListener::new(ledger.clone(), executor.clone(), Some(checkpoints.clone())),
        Arc::new(lock_source),
    );

    // Start destination-chain acknowledgment listener
    start_ack_listener_job(
        AckListener::new(ledger.clone(), Some(checkpoints.clone())),
        Arc::new(ack_source),
    );

    // Start retry mechanism
    start_retry_job(
        RetryScheduler::new(ledger.clone(), executor.clone(), config.max_retries),
        config.retry_interval_secs,
    );

    let app = status_router(AppState { ledger });

    let listener = tokio::net::TcpListener::bind(&config.api_bind_addr).await?;
    tracing::info!("Status API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    tracing::info!("Bridge relayer stopped");
    Ok(())
}
