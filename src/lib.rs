//! Session Trader
//!
//! Automated trading iterations for delegated DEX trading sessions:
//! - Fetch market data for the session's pair
//! - Decide via a remote analysis service, falling back to a local heuristic
//! - Gate the trade on profitability after gas
//! - Approve and swap through a Uniswap-V2-style router
//!
//! # Security Model
//!
//! - Each session trades from its own derived wallet
//! - Key material is fetched per trade and dropped with the signer
//! - Every iteration leaves an audit trail in the activity log

pub mod activity;
pub mod chain;
pub mod config;
pub mod decision;
pub mod engine;
pub mod executor;
pub mod market_data;
pub mod profitability;
pub mod store;
pub mod strategy;
pub mod tokens;
pub mod types;
pub mod units;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use activity::ActivityLogger;
pub use config::{Config, RpcConfig, MASTER_KEY_ENV};
pub use engine::{SessionGuard, SessionLocks, TradingEngine};
pub use error::{Error, Result};
pub use executor::{ExecutionOutcome, TradeExecutor, TradeRequest};
pub use store::{MemoryStore, TradingStore};
