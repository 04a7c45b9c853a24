//! Local technical-analysis heuristic
//!
//! RSI sets the lean (mean reversion), momentum can reinforce it, and
//! return volatility plus pool liquidity shape confidence and slippage.

use async_trait::async_trait;

use super::{conviction_amount, DecisionRequest, DecisionSource};
use crate::types::{Action, Decision};
use crate::Result;

const OVERSOLD_RSI: f64 = 30.0;
const OVERBOUGHT_RSI: f64 = 70.0;
const LEAN_CONFIDENCE: f64 = 0.7;
const NEUTRAL_CONFIDENCE: f64 = 0.5;

const MOMENTUM_WINDOW: usize = 5;
const MOMENTUM_THRESHOLD_PERCENT: f64 = 5.0;
const MOMENTUM_BOOST: f64 = 0.1;

const HIGH_VOLATILITY: f64 = 0.05;
const LOW_VOLATILITY: f64 = 0.01;
const VOLATILITY_PENALTY: f64 = 0.1;

const THIN_LIQUIDITY: f64 = 100_000.0;
const DEEP_LIQUIDITY: f64 = 1_000_000.0;
const THIN_LIQUIDITY_PENALTY: f64 = 0.1;
const DEEP_LIQUIDITY_BONUS: f64 = 0.05;

/// Slippage percentages
const BASE_SLIPPAGE: f64 = 0.5;
const MAX_SLIPPAGE: f64 = 3.0;
const MIN_SLIPPAGE: f64 = 0.1;

/// Deterministic decision source that never fails
pub struct HeuristicDecisionSource;

impl HeuristicDecisionSource {
    pub fn analyze(request: &DecisionRequest) -> Decision {
        let rsi = request.rsi;
        let (action, mut confidence, mut reasoning) = if rsi < OVERSOLD_RSI {
            (
                Action::Buy,
                LEAN_CONFIDENCE,
                vec![format!("RSI {:.1} below {} (oversold)", rsi, OVERSOLD_RSI)],
            )
        } else if rsi > OVERBOUGHT_RSI {
            (
                Action::Sell,
                LEAN_CONFIDENCE,
                vec![format!("RSI {:.1} above {} (overbought)", rsi, OVERBOUGHT_RSI)],
            )
        } else {
            (
                Action::Hold,
                NEUTRAL_CONFIDENCE,
                vec![format!("RSI {:.1} in neutral range", rsi)],
            )
        };

        if let Some(change) = momentum_percent(&request.price_history) {
            if change.abs() > MOMENTUM_THRESHOLD_PERCENT {
                reasoning.push(format!(
                    "Strong momentum: {:+.2}% over the last {} points",
                    change, MOMENTUM_WINDOW
                ));
                let consistent = matches!(
                    (action, change > 0.0),
                    (Action::Buy, true) | (Action::Sell, false)
                );
                if consistent {
                    confidence += MOMENTUM_BOOST;
                } else if action != Action::Hold {
                    reasoning.push("Momentum contradicts the RSI signal".to_string());
                }
            }
        }

        let mut slippage = BASE_SLIPPAGE;

        match return_volatility(&request.price_history) {
            Some(volatility) if volatility > HIGH_VOLATILITY => {
                confidence -= VOLATILITY_PENALTY;
                slippage = (slippage * 2.0).min(MAX_SLIPPAGE);
                reasoning.push(format!(
                    "High volatility {:.2}% widens slippage",
                    volatility * 100.0
                ));
            }
            Some(volatility) if volatility < LOW_VOLATILITY => {
                slippage = (slippage * 0.5).max(MIN_SLIPPAGE);
            }
            Some(_) => {}
            None => reasoning.push("Too little price history to measure volatility".to_string()),
        }

        let liquidity = request.liquidity;
        if liquidity < THIN_LIQUIDITY {
            confidence -= THIN_LIQUIDITY_PENALTY;
            slippage = (slippage + 0.5).min(MAX_SLIPPAGE);
            reasoning.push(format!("Thin liquidity {:.0}", liquidity));
        } else if liquidity > DEEP_LIQUIDITY {
            confidence += DEEP_LIQUIDITY_BONUS;
            slippage = (slippage - 0.1).max(MIN_SLIPPAGE);
            reasoning.push(format!("Deep liquidity {:.0}", liquidity));
        }

        let confidence = clamp_confidence(confidence);

        Decision {
            action,
            confidence,
            suggested_amount: conviction_amount(request.budget, action, confidence),
            suggested_slippage_percent: slippage,
            reasoning,
        }
    }
}

#[async_trait]
impl DecisionSource for HeuristicDecisionSource {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        Ok(Self::analyze(request))
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Clamp to [0, 1] and round to 4 places so sizing stays readable
fn clamp_confidence(confidence: f64) -> f64 {
    if !confidence.is_finite() {
        return 0.0;
    }
    (confidence.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

/// Percentage change across the last five history points
pub fn momentum_percent(history: &[f64]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let window = &history[history.len().saturating_sub(MOMENTUM_WINDOW)..];
    let first = *window.first()?;
    let last = *window.last()?;
    if first == 0.0 {
        return None;
    }
    Some((last - first) / first * 100.0)
}

/// Population standard deviation of consecutive fractional returns; `None`
/// with fewer than two returns
pub fn return_volatility(history: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = history
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}
