//! Domain types shared across the trading engine
//!
//! Sessions and strategies are owned by the configuration surface and are
//! read-only here. Trade records and activity entries are append-only.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// A user's delegation of funds to a bot-controlled wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSession {
    pub id: Uuid,
    /// Address of the user who delegated the funds
    pub user_address: Address,
    /// Delegated wallet derived from the session id
    pub wallet_address: Address,
    /// Allocated funds in units of the pair's quote token (never negative)
    pub allocated_amount: Decimal,
    pub is_active: bool,
    pub strategy_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyType {
    Memecoin,
    Arbitrage,
    LimitOrder,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Memecoin => "MEMECOIN",
            StrategyType::Arbitrage => "ARBITRAGE",
            StrategyType::LimitOrder => "LIMIT_ORDER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Strategy configuration governing sizing and pair selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub risk_level: RiskLevel,
    pub enabled: bool,
    /// Free-form payload, e.g. `{"investmentPercentage": 15}`
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeDirection::Buy => write!(f, "BUY"),
            TradeDirection::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Completed,
    Failed,
}

/// An executed trade, written once per confirmed swap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub wallet_address: Address,
    pub direction: TradeDirection,
    /// Human-readable amount of the source token
    pub amount: String,
    pub pair: String,
    pub status: TradeStatus,
    pub timestamp: DateTime<Utc>,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    TradingCycleStart,
    MarketAnalysis,
    TradingDecision,
    TradeExecutionStart,
    TradeExecutionSuccess,
    TradeExecutionFailed,
    TradingHold,
    TradingSkipped,
    TradingError,
    TradingCycleError,
    ManualIntervention,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::TradingCycleStart => "TRADING_CYCLE_START",
            ActivityType::MarketAnalysis => "MARKET_ANALYSIS",
            ActivityType::TradingDecision => "TRADING_DECISION",
            ActivityType::TradeExecutionStart => "TRADE_EXECUTION_START",
            ActivityType::TradeExecutionSuccess => "TRADE_EXECUTION_SUCCESS",
            ActivityType::TradeExecutionFailed => "TRADE_EXECUTION_FAILED",
            ActivityType::TradingHold => "TRADING_HOLD",
            ActivityType::TradingSkipped => "TRADING_SKIPPED",
            ActivityType::TradingError => "TRADING_ERROR",
            ActivityType::TradingCycleError => "TRADING_CYCLE_ERROR",
            ActivityType::ManualIntervention => "MANUAL_INTERVENTION",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit-trail record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub session_id: Uuid,
    pub activity_type: ActivityType,
    pub details: Value,
    pub confidence: Option<f64>,
    pub is_manual_intervention: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Direction of the swap this action calls for, if any
    pub fn direction(&self) -> Option<TradeDirection> {
        match self {
            Action::Buy => Some(TradeDirection::Buy),
            Action::Sell => Some(TradeDirection::Sell),
            Action::Hold => None,
        }
    }
}

/// Trading recommendation. Ephemeral, summarized into the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: Action,
    /// Always within [0, 1]
    pub confidence: f64,
    pub suggested_amount: Decimal,
    /// Informational only; execution uses the configured slippage
    pub suggested_slippage_percent: f64,
    pub reasoning: Vec<String>,
}

/// A two-token pair written `TOKEN_A/TOKEN_B`.
///
/// BUY spends `token_a` for `token_b`, SELL spends `token_b` for `token_a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub token_a: String,
    pub token_b: String,
}

impl TradingPair {
    pub fn new(token_a: impl Into<String>, token_b: impl Into<String>) -> Self {
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
        }
    }

    /// (source, destination) symbols for a swap in `direction`
    pub fn legs(&self, direction: TradeDirection) -> (&str, &str) {
        match direction {
            TradeDirection::Buy => (&self.token_a, &self.token_b),
            TradeDirection::Sell => (&self.token_b, &self.token_a),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token_a, self.token_b)
    }
}

impl FromStr for TradingPair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
                Ok(Self::new(a.trim().to_uppercase(), b.trim().to_uppercase()))
            }
            _ => Err(Error::InvalidArgument(format!(
                "Invalid pair '{}', expected TOKEN_A/TOKEN_B",
                s
            ))),
        }
    }
}

/// Market data for one pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub current_price: f64,
    pub price_history: Vec<f64>,
    pub volume: f64,
    pub rsi: f64,
    /// Pool liquidity, when the provider reports it separately from volume
    #[serde(default)]
    pub liquidity: Option<f64>,
}

impl MarketSnapshot {
    pub fn liquidity_or_volume(&self) -> f64 {
        self.liquidity.unwrap_or(self.volume)
    }
}
