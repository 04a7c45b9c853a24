//! Configuration for the session trader

pub mod rpc;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

pub use rpc::RpcConfig;

/// Environment variable holding the master secret for delegated wallets
pub const MASTER_KEY_ENV: &str = "DELEGATION_MASTER_KEY";

/// Blockchain connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// EVM chain id (1 = Ethereum, 42161 = Arbitrum, 8453 = Base)
    pub chain_id: u64,
    /// Explicit RPC URL; takes precedence over environment variables
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Uniswap-V2-style router used for quotes and swaps
    #[serde(default)]
    pub router_address: Option<Address>,
    /// How long to wait for a transaction receipt
    pub confirmation_timeout_secs: u64,
}

impl ChainConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Router address, or a configuration error when unset
    pub fn router(&self) -> Result<Address> {
        self.router_address
            .ok_or_else(|| Error::Config("chain.router_address is not configured".to_string()))
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: rpc::chains::ETHEREUM,
            rpc_url: None,
            router_address: None,
            confirmation_timeout_secs: 120,
        }
    }
}

/// Market data provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/market-data".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Decision service and heuristic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Remote analysis endpoint; heuristic-only when unset
    #[serde(default)]
    pub analysis_endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Minimum confidence required to act on a BUY/SELL
    pub min_confidence: f64,
    /// Suggested amounts below this are downgraded to HOLD
    pub dust_floor: Decimal,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            analysis_endpoint: None,
            timeout_ms: 15_000,
            min_confidence: 0.6,
            dust_floor: dec!(0.000001),
        }
    }
}

/// Swap execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Slippage tolerance applied to the router quote (100 = 1%)
    pub slippage_bps: u32,
    /// Swap deadline relative to submission
    pub deadline_secs: u64,
    /// Gas assumed for the swap when it cannot be simulated before approval
    pub fallback_swap_gas: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 100,
            deadline_secs: 300,
            fallback_swap_gas: 200_000,
        }
    }
}

/// Profitability gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitabilityConfig {
    /// Minimum profit fraction (50 = 0.5%)
    pub min_profit_bps: u32,
    /// Multiplier applied to the network gas price (110 = +10%)
    pub gas_price_buffer_percent: u32,
    /// Upper bound on the buffered gas price
    pub max_gas_price_gwei: u64,
}

impl ProfitabilityConfig {
    pub fn max_gas_price_wei(&self) -> U256 {
        U256::from(self.max_gas_price_gwei) * U256::from(1_000_000_000u64)
    }
}

impl Default for ProfitabilityConfig {
    fn default() -> Self {
        Self {
            min_profit_bps: 50,
            gas_price_buffer_percent: 110,
            max_gas_price_gwei: 100,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub market_data: MarketDataConfig,
    pub decision: DecisionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub profitability: ProfitabilityConfig,
    /// JSON snapshot of sessions, strategies, trades and activity
    #[serde(default)]
    pub store_path: Option<String>,
    /// JSONL mirror of the activity log
    #[serde(default)]
    pub audit_log_path: Option<String>,
    /// Serialize iterations per session inside this process
    #[serde(default = "default_true")]
    pub serialize_sessions: bool,
    /// Scheduler interval for `watch` (milliseconds)
    pub check_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// RPC endpoint for the configured chain
    pub fn rpc_url(&self) -> Result<String> {
        if let Some(url) = &self.chain.rpc_url {
            return Ok(url.clone());
        }
        RpcConfig::from_env()
            .get(self.chain.chain_id)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Config(format!(
                    "No RPC URL available for chain {}",
                    self.chain.chain_id
                ))
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            market_data: MarketDataConfig::default(),
            decision: DecisionConfig::default(),
            execution: ExecutionConfig::default(),
            profitability: ProfitabilityConfig::default(),
            store_path: Some("sessions.json".to_string()),
            audit_log_path: Some("activity.jsonl".to_string()),
            serialize_sessions: true,
            check_interval_ms: 60_000, // 1 minute
        }
    }
}
