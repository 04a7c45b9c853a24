//! Trading decisions
//!
//! A [`DecisionSource`] turns market data into a [`Decision`]. Two sources
//! exist: the remote analysis service and the local heuristic. The
//! [`FallbackDecisionSource`] composes them so a remote failure silently
//! degrades to the heuristic, and [`DecisionEngine`] applies the
//! degenerate-amount guard to whatever source answered.

mod heuristic;
mod remote;

pub use heuristic::{momentum_percent, return_volatility, HeuristicDecisionSource};
pub use remote::{parse_response, RemoteDecisionSource};

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::types::{Action, Decision, MarketSnapshot, StrategyType, TradingPair};
use crate::Result;

/// Amounts needing more fractional digits than any ERC-20 token has cannot
/// be expressed reliably as a plain decimal.
const MAX_PLAIN_SCALE: u32 = 18;

/// Confidence assigned to a BUY/SELL downgraded by the amount guard
const DOWNGRADE_CONFIDENCE: f64 = 0.8;

/// Inputs to a decision
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub current_price: f64,
    pub price_history: Vec<f64>,
    pub volume: f64,
    pub rsi: f64,
    pub liquidity: f64,
    pub pair: TradingPair,
    pub strategy_type: StrategyType,
    /// Risk-sized budget the suggested amount is carved from
    pub budget: Decimal,
}

impl DecisionRequest {
    pub fn new(
        market: &MarketSnapshot,
        pair: TradingPair,
        strategy_type: StrategyType,
        budget: Decimal,
    ) -> Self {
        Self {
            current_price: market.current_price,
            price_history: market.price_history.clone(),
            volume: market.volume,
            rsi: market.rsi,
            liquidity: market.liquidity_or_volume(),
            pair,
            strategy_type,
            budget,
        }
    }
}

/// Produces trading recommendations
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision>;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

/// Tries `primary`, answering from `fallback` when it fails
pub struct FallbackDecisionSource {
    primary: Arc<dyn DecisionSource>,
    fallback: Arc<dyn DecisionSource>,
}

impl FallbackDecisionSource {
    pub fn new(primary: Arc<dyn DecisionSource>, fallback: Arc<dyn DecisionSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl DecisionSource for FallbackDecisionSource {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        match self.primary.decide(request).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Decision source failed, falling back"
                );
                let mut decision = self.fallback.decide(request).await?;
                decision.reasoning.insert(
                    0,
                    format!(
                        "{} unavailable ({}), decided by {}",
                        self.primary.name(),
                        e,
                        self.fallback.name()
                    ),
                );
                Ok(decision)
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

/// Decision source plus the degenerate-amount guard
pub struct DecisionEngine {
    source: Arc<dyn DecisionSource>,
    dust_floor: Decimal,
}

impl DecisionEngine {
    pub fn new(source: Arc<dyn DecisionSource>, dust_floor: Decimal) -> Self {
        Self { source, dust_floor }
    }

    pub async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        let decision = self.source.decide(request).await?;
        Ok(guard_degenerate_amount(decision, self.dust_floor))
    }
}

/// Size a BUY/SELL by conviction: `budget * confidence`. HOLD sizes to zero.
pub fn conviction_amount(budget: Decimal, action: Action, confidence: f64) -> Decimal {
    if action == Action::Hold {
        return Decimal::ZERO;
    }
    let confidence = Decimal::from_f64(confidence).unwrap_or(Decimal::ZERO);
    (budget * confidence).normalize()
}

/// Downgrade a BUY/SELL whose suggested amount is unusable to HOLD
pub fn guard_degenerate_amount(mut decision: Decision, dust_floor: Decimal) -> Decision {
    if decision.action == Action::Hold {
        return decision;
    }

    let amount = decision.suggested_amount;
    let problem = if amount <= Decimal::ZERO {
        Some("non-positive")
    } else if amount < dust_floor {
        Some("below the dust floor")
    } else if amount.normalize().scale() > MAX_PLAIN_SCALE {
        Some("too small to express as a plain decimal")
    } else {
        None
    };

    if let Some(problem) = problem {
        decision.reasoning.push(format!(
            "Suggested amount {} is {}; downgrading {:?} to HOLD",
            amount, problem, decision.action
        ));
        decision.action = Action::Hold;
        decision.confidence = DOWNGRADE_CONFIDENCE;
        decision.suggested_amount = Decimal::ZERO;
    }
    decision
}
