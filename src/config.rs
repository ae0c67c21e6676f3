//! Process configuration loaded from environment variables
//!
//! `dotenvy` is applied by `main` before [`RelayerConfig::from_env`] runs.
//! Each setting has a primary variable name; the names used by earlier
//! deployments are accepted as fallbacks.

use std::env;
use std::str::FromStr;

use crate::services::relay_executor::DEFAULT_CONFIRMATION_TIMEOUT_SECS;

/// Default retry sweep interval in seconds (5 minutes)
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 300;

/// Default number of retry attempts per lockId
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default event polling interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

pub const DEFAULT_API_BIND_ADDR: &str = "0.0.0.0:3000";

/// Environment variable names
const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_SOURCE_RPC_URL: &[&str] = &["SOURCE_RPC_URL", "ERBIE_RPC_URL"];
const ENV_SOURCE_BRIDGE_ADDRESS: &[&str] = &["SOURCE_BRIDGE_ADDRESS", "ERBIE_BRIDGE_ADDRESS"];
const ENV_SOURCE_START_BLOCK: &str = "SOURCE_START_BLOCK";
const ENV_DEST_RPC_URL: &[&str] = &["DEST_RPC_URL", "BSC_RPC_URL"];
const ENV_DEST_MINT_CONTRACT: &[&str] = &["DEST_MINT_CONTRACT", "BSC_LLA_CONTRACT_ADDRESS"];
const ENV_DEST_ACK_CONTRACT: &str = "DEST_ACK_CONTRACT";
const ENV_DEST_START_BLOCK: &str = "DEST_START_BLOCK";
const ENV_DEST_PRIVATE_KEY: &[&str] = &["DEST_PRIVATE_KEY", "BSC_PRIVATE_KEY"];
const ENV_RETRY_INTERVAL: &str = "RETRY_INTERVAL_SECS";
const ENV_MAX_RETRIES: &str = "MAX_RETRIES";
const ENV_CONFIRMATION_TIMEOUT: &str = "CONFIRMATION_TIMEOUT_SECS";
const ENV_POLL_INTERVAL: &str = "EVENT_POLL_INTERVAL_SECS";
const ENV_API_BIND_ADDR: &str = "API_BIND_ADDR";

/// Error types for configuration loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "Missing config: {} must be set", name),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct RelayerConfig {
    pub database_url: String,
    pub source_rpc_url: String,
    pub source_bridge_address: String,
    pub source_start_block: Option<u64>,
    pub dest_rpc_url: String,
    pub dest_mint_contract: String,
    pub dest_ack_contract: String,
    pub dest_start_block: Option<u64>,
    pub dest_private_key: String,
    pub retry_interval_secs: u64,
    pub max_retries: i32,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub api_bind_addr: String,
}

// The signing key never reaches the logs
impl std::fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("database_url", &"<redacted>")
            .field("source_rpc_url", &self.source_rpc_url)
            .field("source_bridge_address", &self.source_bridge_address)
            .field("source_start_block", &self.source_start_block)
            .field("dest_rpc_url", &self.dest_rpc_url)
            .field("dest_mint_contract", &self.dest_mint_contract)
            .field("dest_ack_contract", &self.dest_ack_contract)
            .field("dest_start_block", &self.dest_start_block)
            .field("dest_private_key", &"<redacted>")
            .field("retry_interval_secs", &self.retry_interval_secs)
            .field("max_retries", &self.max_retries)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("api_bind_addr", &self.api_bind_addr)
            .finish()
    }
}

impl RelayerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dest_mint_contract = required(&lookup, ENV_DEST_MINT_CONTRACT)?;
        let dest_ack_contract =
            first_of(&lookup, &[ENV_DEST_ACK_CONTRACT]).unwrap_or_else(|| dest_mint_contract.clone());

        let max_retries: i32 = parse_or(&lookup, ENV_MAX_RETRIES, DEFAULT_MAX_RETRIES)?;
        if max_retries < 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must not be negative",
                ENV_MAX_RETRIES
            )));
        }

        let retry_interval_secs = parse_or(&lookup, ENV_RETRY_INTERVAL, DEFAULT_RETRY_INTERVAL_SECS)?;
        let poll_interval_secs = parse_or(&lookup, ENV_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_SECS)?;
        if retry_interval_secs == 0 || poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "intervals must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            database_url: first_of(&lookup, &[ENV_DATABASE_URL]).ok_or(ConfigError::Missing(ENV_DATABASE_URL))?,
            source_rpc_url: required(&lookup, ENV_SOURCE_RPC_URL)?,
            source_bridge_address: required(&lookup, ENV_SOURCE_BRIDGE_ADDRESS)?,
            source_start_block: parse_opt(&lookup, ENV_SOURCE_START_BLOCK)?,
            dest_rpc_url: required(&lookup, ENV_DEST_RPC_URL)?,
            dest_mint_contract,
            dest_ack_contract,
            dest_start_block: parse_opt(&lookup, ENV_DEST_START_BLOCK)?,
            dest_private_key: required(&lookup, ENV_DEST_PRIVATE_KEY)?,
            retry_interval_secs,
            max_retries,
            confirmation_timeout_secs: parse_or(
                &lookup,
                ENV_CONFIRMATION_TIMEOUT,
                DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            )?,
            poll_interval_secs,
            api_bind_addr: first_of(&lookup, &[ENV_API_BIND_ADDR])
                .unwrap_or_else(|| DEFAULT_API_BIND_ADDR.to_string()),
        })
    }
}

fn first_of<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .find_map(|name| lookup(*name).filter(|v| !v.trim().is_empty()))
}

fn required<F>(lookup: &F, names: &'static [&'static str]) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    first_of(lookup, names).ok_or(ConfigError::Missing(names[0]))
}

fn parse_opt<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("{}={}: {}", name, raw, e))),
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, name)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://relayer@localhost/bridge"),
            ("SOURCE_RPC_URL", "http://source:8545"),
            ("SOURCE_BRIDGE_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("DEST_RPC_URL", "http://dest:8545"),
            ("DEST_MINT_CONTRACT", "0x2222222222222222222222222222222222222222"),
            ("DEST_PRIVATE_KEY", "0xkey"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<RelayerConfig, ConfigError> {
        RelayerConfig::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.retry_interval_secs, 300);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.confirmation_timeout_secs, DEFAULT_CONFIRMATION_TIMEOUT_SECS);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.api_bind_addr, DEFAULT_API_BIND_ADDR);
        assert_eq!(config.dest_ack_contract, config.dest_mint_contract);
        assert_eq!(config.source_start_block, None);
    }

    #[test]
    fn test_legacy_names_are_accepted() {
        let mut env = base_env();
        env.remove("SOURCE_RPC_URL");
        env.remove("DEST_PRIVATE_KEY");
        env.insert("ERBIE_RPC_URL", "http://erbie:8545");
        env.insert("BSC_PRIVATE_KEY", "0xlegacy");

        let config = load(&env).unwrap();
        assert_eq!(config.source_rpc_url, "http://erbie:8545");
        assert_eq!(config.dest_private_key, "0xlegacy");
    }

    #[test]
    fn test_missing_required_value() {
        let mut env = base_env();
        env.remove("DEST_RPC_URL");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("DEST_RPC_URL"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut env = base_env();
        env.insert("MAX_RETRIES", "three");
        assert!(matches!(load(&env), Err(ConfigError::Invalid(_))));

        let mut env = base_env();
        env.insert("SOURCE_START_BLOCK", "12345");
        assert_eq!(load(&env).unwrap().source_start_block, Some(12345));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("0xkey"));
        assert!(rendered.contains("<redacted>"));
    }
}
