//! Error types for the session trader

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Strategy {0} not found")]
    StrategyNotFound(Uuid),

    #[error("Session {0} is inactive")]
    SessionInactive(Uuid),

    #[error("Strategy {0} is disabled")]
    StrategyDisabled(Uuid),

    #[error("Trade not profitable: {profit_bps} bps below minimum {min_profit_bps} bps")]
    NotProfitable { profit_bps: String, min_profit_bps: u32 },

    #[error("Decision service error: {0}")]
    Decision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    /// The swap is on chain but its record or success entry was not written
    #[error("Swap {tx_hash} confirmed but not recorded: {reason}")]
    Unrecorded { tx_hash: String, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Terminal-for-the-iteration conditions that are not failures of an
    /// external system.
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::SessionInactive(_) | Error::StrategyDisabled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
