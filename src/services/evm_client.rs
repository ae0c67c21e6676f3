//! EVM chain clients built on alloy
//!
//! `EvmMintClient` submits `mint` on the destination token contract and polls
//! for its receipt. `EvmLockEventSource` and `EvmAckEventSource` poll
//! `eth_getLogs` in bounded block ranges and forward decoded events over a
//! channel.

use alloy::{
    network::EthereumWallet,
    primitives::{Address, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::{Filter, Log},
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolEvent,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::relay::{AckEvent, AckTarget, LockEvent};
use crate::services::chain::{
    AckEventSource, ChainClientError, LockEventSource, MintClient, PendingMint,
};

/// Largest block range requested in one `eth_getLogs` call
const MAX_BLOCK_RANGE: u64 = 2000;

/// Receipt polling interval while waiting for a mint confirmation (ms)
const RECEIPT_POLL_INTERVAL_MS: u64 = 2000;

/// Buffered events per subscription
const EVENT_CHANNEL_CAPACITY: usize = 256;

// Source-chain bridge: emits TokenLocked when a user escrows an asset
sol! {
    interface ISourceBridge {
        event TokenLocked(
            address indexed user,
            address tokenAddress,
            uint256 amount,
            uint256 lockId,
            uint256 timestamp
        );
    }
}

// Destination-chain bridged token: originTxHash is the replay-protection key
sol! {
    #[sol(rpc)]
    interface IBridgedToken {
        function mint(address to, uint256 amount, bytes32 originTxHash) external;

        event TokenMinted(address indexed to, uint256 amount, bytes32 indexed originTxHash);
    }
}

// Destination-chain bridge acknowledgment
sol! {
    interface IDestinationBridge {
        event CrossedSuccess(uint256 lockId, bool success);
    }
}

fn http_provider(rpc_url: &str) -> Result<RootProvider<Http<Client>>, ChainClientError> {
    Ok(ProviderBuilder::new().on_http(rpc_url.parse().map_err(|e| {
        ChainClientError::InvalidInput(format!("Invalid RPC URL: {}", e))
    })?))
}

fn parse_address(label: &str, address: &str) -> Result<Address, ChainClientError> {
    Address::from_str(address)
        .map_err(|e| ChainClientError::InvalidInput(format!("Invalid {} address: {}", label, e)))
}

/// Mint client for the destination chain
pub struct EvmMintClient {
    provider: RootProvider<Http<Client>>,
    wallet: EthereumWallet,
    rpc_url: String,
    contract_address: Address,
}

impl EvmMintClient {
    /// Create a new EvmMintClient
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - Destination chain RPC URL
    /// * `private_key` - Relayer signing key (hex string with 0x prefix)
    /// * `contract_address` - Bridged token contract exposing `mint`
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid or the RPC is unreachable
    pub async fn new(
        rpc_url: &str,
        private_key: &str,
        contract_address: &str,
    ) -> Result<Self, ChainClientError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| ChainClientError::InvalidInput(format!("Invalid private key: {}", e)))?;
        let relayer_address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = http_provider(rpc_url)?;

        let chain_id = provider.get_chain_id().await.map_err(|e| {
            error!(error = %e, "Failed to connect to destination chain RPC");
            ChainClientError::Rpc(format!("Connection failed: {}", e))
        })?;

        let contract_address = parse_address("mint contract", contract_address)?;

        info!(
            chain_id = chain_id,
            contract = %contract_address,
            relayer = %relayer_address,
            "EvmMintClient initialized"
        );

        Ok(Self {
            provider,
            wallet,
            rpc_url: rpc_url.to_string(),
            contract_address,
        })
    }
}

#[async_trait]
impl MintClient for EvmMintClient {
    async fn submit_mint(
        &self,
        user: &str,
        amount: &str,
        origin_hash: [u8; 32],
    ) -> Result<PendingMint, ChainClientError> {
        let to = parse_address("recipient", user)?;
        let amount = U256::from_str(amount)
            .map_err(|e| ChainClientError::InvalidInput(format!("Invalid amount {}: {}", amount, e)))?;

        // Signing provider is built per call, fillers take care of nonce, gas and chain id
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.parse().map_err(|e| {
                ChainClientError::InvalidInput(format!("Invalid RPC URL: {}", e))
            })?);

        let token = IBridgedToken::new(self.contract_address, &provider);

        let pending = token
            .mint(to, amount, B256::from(origin_hash))
            .send()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?;

        Ok(PendingMint {
            tx_hash: pending.tx_hash().to_string(),
        })
    }

    async fn wait_for_confirmation(&self, pending: &PendingMint) -> Result<u64, ChainClientError> {
        let tx_hash = B256::from_str(&pending.tx_hash).map_err(|e| {
            ChainClientError::InvalidInput(format!("Invalid transaction hash: {}", e))
        })?;

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if !receipt.status() {
                        return Err(ChainClientError::Reverted(pending.tx_hash.clone()));
                    }
                    return Ok(receipt.block_number.unwrap_or_default());
                }
                Ok(None) => {
                    debug!(tx_hash = %pending.tx_hash, "Mint not mined yet, polling...");
                }
                Err(e) => {
                    // Transient; the executor's timeout bounds the wait
                    warn!(tx_hash = %pending.tx_hash, error = %e, "Receipt query failed");
                }
            }

            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
        }
    }
}

/// Polls logs matching `signatures` on `address`, starting at `next_block`
#[derive(Clone)]
struct LogPoller {
    name: &'static str,
    provider: RootProvider<Http<Client>>,
    address: Address,
    signatures: Vec<B256>,
    next_block: Arc<AtomicU64>,
    poll_interval: Duration,
}

impl LogPoller {
    async fn new(
        name: &'static str,
        rpc_url: &str,
        address: Address,
        signatures: Vec<B256>,
        start_block: Option<u64>,
        poll_interval: Duration,
    ) -> Result<Self, ChainClientError> {
        let provider = http_provider(rpc_url)?;

        let start_block = match start_block {
            Some(block) => block,
            None => provider.get_block_number().await.map_err(|e| {
                ChainClientError::Rpc(format!("Failed to get block number: {}", e))
            })?,
        };

        info!(
            listener = name,
            address = %address,
            start_block = start_block,
            "Log poller initialized"
        );

        Ok(Self {
            name,
            provider,
            address,
            signatures,
            next_block: Arc::new(AtomicU64::new(start_block)),
            poll_interval,
        })
    }

    /// Forward decoded logs to `tx` until the receiver is dropped
    async fn run<T, F>(self, tx: mpsc::Sender<T>, decode: F)
    where
        T: Send + 'static,
        F: Fn(&Log) -> Option<T> + Send + 'static,
    {
        loop {
            if tx.is_closed() {
                debug!(listener = self.name, "Subscriber gone, stopping log poller");
                return;
            }

            let head = match self.provider.get_block_number().await {
                Ok(head) => head,
                Err(e) => {
                    warn!(listener = self.name, error = %e, "Failed to get block number");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            let from_block = self.next_block.load(Ordering::SeqCst);
            if from_block > head {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            let to_block = head.min(from_block + MAX_BLOCK_RANGE - 1);

            let filter = Filter::new()
                .address(self.address)
                .event_signature(self.signatures.clone())
                .from_block(from_block)
                .to_block(to_block);

            match self.provider.get_logs(&filter).await {
                Ok(logs) => {
                    if !logs.is_empty() {
                        debug!(
                            listener = self.name,
                            count = logs.len(),
                            from_block = from_block,
                            to_block = to_block,
                            "Fetched logs"
                        );
                    }
                    for log in &logs {
                        if let Some(event) = decode(log) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    self.next_block.store(to_block + 1, Ordering::SeqCst);

                    // Still catching up, skip the sleep
                    if to_block < head {
                        continue;
                    }
                }
                Err(e) => {
                    warn!(
                        listener = self.name,
                        from_block = from_block,
                        to_block = to_block,
                        error = %e,
                        "Failed to get logs"
                    );
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn decode_lock_event(log: &Log) -> Option<LockEvent> {
    let decoded = match log.log_decode::<ISourceBridge::TokenLocked>() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Failed to decode TokenLocked log, skipping");
            return None;
        }
    };
    let event = &decoded.inner.data;

    let lock_id = match i64::try_from(event.lockId) {
        Ok(lock_id) => lock_id,
        Err(_) => {
            error!(lock_id = %event.lockId, "TokenLocked lockId out of range, skipping");
            return None;
        }
    };

    Some(LockEvent {
        lock_id,
        user: event.user.to_string(),
        token_address: event.tokenAddress.to_string(),
        amount: event.amount.to_string(),
        origin_tx_hash: log.transaction_hash.map(|h| h.to_string()),
        block_number: log.block_number,
        log_index: log.log_index,
    })
}

fn decode_ack_event(log: &Log) -> Option<AckEvent> {
    let topic0 = *log.topics().first()?;

    if topic0 == IDestinationBridge::CrossedSuccess::SIGNATURE_HASH {
        let decoded = match log.log_decode::<IDestinationBridge::CrossedSuccess>() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Failed to decode CrossedSuccess log, skipping");
                return None;
            }
        };
        let event = &decoded.inner.data;
        let lock_id = match i64::try_from(event.lockId) {
            Ok(lock_id) => lock_id,
            Err(_) => {
                warn!(lock_id = %event.lockId, "CrossedSuccess lockId out of range, skipping");
                return None;
            }
        };

        return Some(AckEvent {
            target: AckTarget::LockId(lock_id),
            success: event.success,
            block_number: log.block_number,
        });
    }

    if topic0 == IBridgedToken::TokenMinted::SIGNATURE_HASH {
        let decoded = match log.log_decode::<IBridgedToken::TokenMinted>() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Failed to decode TokenMinted log, skipping");
                return None;
            }
        };

        return Some(AckEvent {
            target: AckTarget::OriginHash(decoded.inner.data.originTxHash.to_string()),
            success: true,
            block_number: log.block_number,
        });
    }

    None
}

/// `TokenLocked` subscription on the source-chain bridge
pub struct EvmLockEventSource {
    poller: LogPoller,
}

impl EvmLockEventSource {
    pub async fn new(
        rpc_url: &str,
        bridge_address: &str,
        start_block: Option<u64>,
        poll_interval: Duration,
    ) -> Result<Self, ChainClientError> {
        let poller = LogPoller::new(
            "lock_listener",
            rpc_url,
            parse_address("source bridge", bridge_address)?,
            vec![ISourceBridge::TokenLocked::SIGNATURE_HASH],
            start_block,
            poll_interval,
        )
        .await?;

        Ok(Self { poller })
    }
}

#[async_trait]
impl LockEventSource for EvmLockEventSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<LockEvent>, ChainClientError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(self.poller.clone().run(tx, decode_lock_event));
        Ok(rx)
    }
}

/// `CrossedSuccess` / `TokenMinted` subscription on the destination chain
pub struct EvmAckEventSource {
    poller: LogPoller,
}

impl EvmAckEventSource {
    pub async fn new(
        rpc_url: &str,
        contract_address: &str,
        start_block: Option<u64>,
        poll_interval: Duration,
    ) -> Result<Self, ChainClientError> {
        let poller = LogPoller::new(
            "ack_listener",
            rpc_url,
            parse_address("ack contract", contract_address)?,
            vec![
                IDestinationBridge::CrossedSuccess::SIGNATURE_HASH,
                IBridgedToken::TokenMinted::SIGNATURE_HASH,
            ],
            start_block,
            poll_interval,
        )
        .await?;

        Ok(Self { poller })
    }
}

#[async_trait]
impl AckEventSource for EvmAckEventSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<AckEvent>, ChainClientError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(self.poller.clone().run(tx, decode_ack_event));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn rpc_log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_number: Some(42),
            log_index: Some(3),
            transaction_hash: Some(B256::repeat_byte(0xab)),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_lock_event() {
        let user = Address::repeat_byte(0x11);
        let token = Address::repeat_byte(0x22);
        let event = ISourceBridge::TokenLocked {
            user,
            tokenAddress: token,
            amount: U256::from(1_000_000_000_000_000_000u128),
            lockId: U256::from(1u64),
            timestamp: U256::from(1_700_000_000u64),
        };
        let log_data = event.encode_log_data();
        let log = rpc_log(
            Address::repeat_byte(0x33),
            log_data.topics().to_vec(),
            log_data.data.to_vec(),
        );

        let decoded = decode_lock_event(&log).expect("TokenLocked should decode");
        assert_eq!(decoded.lock_id, 1);
        assert_eq!(decoded.user, user.to_string());
        assert_eq!(decoded.token_address, token.to_string());
        assert_eq!(decoded.amount, "1000000000000000000");
        assert_eq!(decoded.origin_tx_hash, Some(B256::repeat_byte(0xab).to_string()));
        assert_eq!(decoded.block_number, Some(42));
        assert_eq!(decoded.log_index, Some(3));
    }

    #[test]
    fn test_decode_crossed_success() {
        let event = IDestinationBridge::CrossedSuccess {
            lockId: U256::from(5u64),
            success: false,
        };
        let log_data = event.encode_log_data();
        let log = rpc_log(
            Address::ZERO,
            log_data.topics().to_vec(),
            log_data.data.to_vec(),
        );

        let ack = decode_ack_event(&log).expect("CrossedSuccess should decode");
        assert_eq!(ack.target, AckTarget::LockId(5));
        assert!(!ack.success);
    }

    #[test]
    fn test_decode_token_minted_targets_origin_hash() {
        let origin = B256::repeat_byte(0xcd);
        let event = IBridgedToken::TokenMinted {
            to: Address::repeat_byte(0x11),
            amount: U256::from(10u64),
            originTxHash: origin,
        };
        let log_data = event.encode_log_data();
        let log = rpc_log(
            Address::ZERO,
            log_data.topics().to_vec(),
            log_data.data.to_vec(),
        );

        let ack = decode_ack_event(&log).expect("TokenMinted should decode");
        assert_eq!(ack.target, AckTarget::OriginHash(origin.to_string()));
        assert!(ack.success);
    }

    #[test]
    fn test_decode_ack_ignores_unknown_topics() {
        let log = rpc_log(Address::ZERO, vec![B256::repeat_byte(0x01)], vec![]);
        assert!(decode_ack_event(&log).is_none());
    }
}
