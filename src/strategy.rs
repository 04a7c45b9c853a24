//! Session strategy resolution
//!
//! Maps a session and its strategy to a trading pair and a sizing fraction.
//! Pair selection is a fixed table per strategy type.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::{
    RiskLevel, Strategy, StrategyType, TradeDirection, TradingPair, TradingSession,
};
use crate::{Error, Result};

/// Strategy config key overriding the risk-level fraction (in percent)
pub const INVESTMENT_PERCENTAGE_KEY: &str = "investmentPercentage";

/// Pair traded by each strategy type
pub fn pair_for(strategy_type: StrategyType) -> TradingPair {
    match strategy_type {
        StrategyType::Memecoin => TradingPair::new("USDC", "SHIB"),
        StrategyType::Arbitrage => TradingPair::new("USDC", "WETH"),
        StrategyType::LimitOrder => TradingPair::new("USDC", "WBTC"),
    }
}

/// Digits kept when converting a quote amount into the base token
const BASE_AMOUNT_DP: u32 = 18;

/// Fraction of allocated funds committed per trade at a risk level
pub fn risk_fraction(risk: RiskLevel) -> Decimal {
    match risk {
        RiskLevel::Low => dec!(0.05),
        RiskLevel::Medium => dec!(0.10),
        RiskLevel::High => dec!(0.20),
    }
}

/// What an iteration trades and how much of the allocation it may use
#[derive(Debug, Clone)]
pub struct ResolvedStrategy {
    pub pair: TradingPair,
    pub sizing_fraction: Decimal,
    pub strategy_type: StrategyType,
}

impl ResolvedStrategy {
    /// Risk-sized budget for one trade
    pub fn budget(&self, allocated: Decimal) -> Decimal {
        (allocated * self.sizing_fraction).normalize()
    }

    /// Executed amount: the smaller of the budget and the suggestion
    pub fn trade_amount(&self, allocated: Decimal, suggested: Decimal) -> Decimal {
        self.budget(allocated).min(suggested).normalize()
    }

    /// Amount of the swap's source token worth `quote_amount`.
    ///
    /// Allocations and suggestions are in the quote token (`token_a`). A BUY
    /// spends the quote token as is; a SELL spends the base token, so the
    /// amount is divided by `price` (quote per base) and truncated.
    pub fn source_amount(
        &self,
        quote_amount: Decimal,
        direction: TradeDirection,
        price: f64,
    ) -> Result<Decimal> {
        match direction {
            TradeDirection::Buy => Ok(quote_amount.normalize()),
            TradeDirection::Sell => {
                let price = Decimal::from_f64(price)
                    .filter(|p| *p > Decimal::ZERO)
                    .ok_or_else(|| {
                        Error::DataUnavailable(format!(
                            "Cannot size a {} sale at price {}",
                            self.pair, price
                        ))
                    })?;
                let amount = quote_amount.checked_div(price).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "{} at price {} does not fit a decimal",
                        quote_amount, price
                    ))
                })?;
                Ok(amount
                    .round_dp_with_strategy(BASE_AMOUNT_DP, RoundingStrategy::ToZero)
                    .normalize())
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStrategyResolver;

impl SessionStrategyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Fails with [`Error::SessionInactive`] or [`Error::StrategyDisabled`]
    pub fn resolve(
        &self,
        session: &TradingSession,
        strategy: &Strategy,
    ) -> Result<ResolvedStrategy> {
        if !session.is_active {
            return Err(Error::SessionInactive(session.id));
        }
        if !strategy.enabled {
            return Err(Error::StrategyDisabled(strategy.id));
        }

        Ok(ResolvedStrategy {
            pair: pair_for(strategy.strategy_type),
            sizing_fraction: sizing_fraction(strategy),
            strategy_type: strategy.strategy_type,
        })
    }
}

/// `investmentPercentage` overrides the risk level wholesale when it is a
/// usable percentage; anything else falls back to the risk level.
fn sizing_fraction(strategy: &Strategy) -> Decimal {
    let override_percent = strategy
        .config
        .get(INVESTMENT_PERCENTAGE_KEY)
        .and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        })
        .filter(|p| p.is_finite() && *p > 0.0 && *p <= 100.0)
        .and_then(Decimal::from_f64);

    match override_percent {
        Some(percent) => {
            tracing::debug!(
                strategy_id = %strategy.id,
                percent = %percent,
                "Using investmentPercentage override"
            );
            percent / dec!(100)
        }
        None => risk_fraction(strategy.risk_level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use serde_json::json;
    use uuid::Uuid;

    fn session(active: bool) -> TradingSession {
        TradingSession {
            id: Uuid::new_v4(),
            user_address: Address::ZERO,
            wallet_address: Address::ZERO,
            allocated_amount: dec!(1000),
            is_active: active,
            strategy_id: Uuid::new_v4(),
        }
    }

    fn strategy(strategy_type: StrategyType, risk: RiskLevel, config: serde_json::Value) -> Strategy {
        Strategy {
            id: Uuid::new_v4(),
            strategy_type,
            risk_level: risk,
            enabled: true,
            config,
        }
    }

    #[test]
    fn risk_levels_size_allocation() {
        let resolver = SessionStrategyResolver::new();
        let s = session(true);
        for (risk, budget) in [
            (RiskLevel::Low, dec!(50)),
            (RiskLevel::Medium, dec!(100)),
            (RiskLevel::High, dec!(200)),
        ] {
            let resolved = resolver
                .resolve(&s, &strategy(StrategyType::Arbitrage, risk, json!({})))
                .unwrap();
            assert_eq!(resolved.budget(s.allocated_amount), budget);
        }
    }

    #[test]
    fn pairs_are_fixed_per_strategy_type() {
        assert_eq!(pair_for(StrategyType::Memecoin).to_string(), "USDC/SHIB");
        assert_eq!(pair_for(StrategyType::Arbitrage).to_string(), "USDC/WETH");
        assert_eq!(pair_for(StrategyType::LimitOrder).to_string(), "USDC/WBTC");
    }

    #[test]
    fn investment_percentage_overrides_risk() {
        let resolver = SessionStrategyResolver::new();
        let s = session(true);
        let resolved = resolver
            .resolve(
                &s,
                &strategy(
                    StrategyType::Memecoin,
                    RiskLevel::Low,
                    json!({ "investmentPercentage": 15 }),
                ),
            )
            .unwrap();
        assert_eq!(resolved.sizing_fraction, dec!(0.15));
        assert_eq!(resolved.budget(s.allocated_amount), dec!(150));

        let as_string = resolver
            .resolve(
                &s,
                &strategy(
                    StrategyType::Memecoin,
                    RiskLevel::Low,
                    json!({ "investmentPercentage": "7.5" }),
                ),
            )
            .unwrap();
        assert_eq!(as_string.sizing_fraction, dec!(0.075));
    }

    #[test]
    fn unusable_override_falls_back_to_risk() {
        let resolver = SessionStrategyResolver::new();
        let resolved = resolver
            .resolve(
                &session(true),
                &strategy(
                    StrategyType::Arbitrage,
                    RiskLevel::High,
                    json!({ "investmentPercentage": 250 }),
                ),
            )
            .unwrap();
        assert_eq!(resolved.sizing_fraction, dec!(0.20));
    }

    #[test]
    fn trade_amount_is_min_of_budget_and_suggestion() {
        let resolved = ResolvedStrategy {
            pair: pair_for(StrategyType::Arbitrage),
            sizing_fraction: dec!(0.10),
            strategy_type: StrategyType::Arbitrage,
        };
        assert_eq!(resolved.trade_amount(dec!(1000), dec!(80)), dec!(80));
        assert_eq!(resolved.trade_amount(dec!(1000), dec!(120)), dec!(100));
        assert_eq!(resolved.trade_amount(dec!(1000), dec!(80)).to_string(), "80");
    }

    #[test]
    fn sell_is_sized_in_the_base_token() {
        let resolved = ResolvedStrategy {
            pair: pair_for(StrategyType::Arbitrage),
            sizing_fraction: dec!(0.10),
            strategy_type: StrategyType::Arbitrage,
        };
        // 80 USDC of WETH at 2500 USDC/WETH
        let sell = resolved
            .source_amount(dec!(80), TradeDirection::Sell, 2500.0)
            .unwrap();
        assert_eq!(sell, dec!(0.032));
        assert_eq!(
            resolved
                .source_amount(dec!(80), TradeDirection::Buy, 2500.0)
                .unwrap(),
            dec!(80)
        );

        // non-terminating quotient is truncated, never rounded up
        let third = resolved
            .source_amount(dec!(1), TradeDirection::Sell, 3.0)
            .unwrap();
        assert_eq!(third.to_string(), "0.333333333333333333");

        assert!(resolved
            .source_amount(dec!(80), TradeDirection::Sell, 0.0)
            .is_err());
        assert!(resolved
            .source_amount(dec!(80), TradeDirection::Sell, f64::NAN)
            .is_err());
    }

    #[test]
    fn inactive_session_and_disabled_strategy_fail() {
        let resolver = SessionStrategyResolver::new();
        let inactive = session(false);
        let err = resolver
            .resolve(&inactive, &strategy(StrategyType::Arbitrage, RiskLevel::Low, json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::SessionInactive(id) if id == inactive.id));
        assert!(err.is_skip());

        let mut disabled = strategy(StrategyType::Arbitrage, RiskLevel::Low, json!({}));
        disabled.enabled = false;
        let err = resolver.resolve(&session(true), &disabled).unwrap_err();
        assert!(matches!(err, Error::StrategyDisabled(_)));
        assert!(err.is_skip());
    }
}
