//! Profitability gate
//!
//! Rejects trades whose expected return after gas falls below the minimum
//! profit fraction. All money arithmetic is done on `U256` with the
//! threshold compared by cross-multiplication, so no precision is lost on
//! 18-decimal amounts.

use alloy::primitives::U256;
use serde::Serialize;

use crate::chain::ChainClient;
use crate::config::ProfitabilityConfig;
use crate::types::TradeDirection;
use crate::Result;

const BPS: u64 = 10_000;

/// Every intermediate of one profitability check, for the audit trail
#[derive(Debug, Clone, Serialize)]
pub struct ProfitAssessment {
    pub amount_in: U256,
    pub amount_out: U256,
    pub gas_units: u64,
    /// Buffered and capped gas price (wei)
    pub gas_price: U256,
    /// Gas cost in native currency (wei)
    pub gas_cost: U256,
    pub gas_cost_in_tokens: U256,
    /// Profit fraction in basis points, rounded toward zero; `None` when gas
    /// swallows the whole proceeds
    pub profit_bps: Option<U256>,
    pub min_profit_bps: u32,
    pub accepted: bool,
}

impl ProfitAssessment {
    pub fn profit_bps_display(&self) -> String {
        self.profit_bps
            .map(|bps| bps.to_string())
            .unwrap_or_else(|| "negative".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ProfitabilityEvaluator {
    min_profit_bps: u32,
    gas_price_buffer_percent: u32,
    max_gas_price: U256,
}

impl ProfitabilityEvaluator {
    pub fn new(config: &ProfitabilityConfig) -> Self {
        Self {
            min_profit_bps: config.min_profit_bps,
            gas_price_buffer_percent: config.gas_price_buffer_percent,
            max_gas_price: config.max_gas_price_wei(),
        }
    }

    /// Network gas price plus buffer, capped at the configured maximum
    pub fn buffered_gas_price(&self, network_gas_price: U256) -> U256 {
        let buffered = network_gas_price.saturating_mul(U256::from(self.gas_price_buffer_percent))
            / U256::from(100u64);
        buffered.min(self.max_gas_price)
    }

    /// Fetch the network gas price and assess the trade
    pub async fn is_profitable(
        &self,
        chain: &dyn ChainClient,
        amount_in: U256,
        amount_out: U256,
        gas_units: u64,
        direction: TradeDirection,
    ) -> Result<ProfitAssessment> {
        let network_gas_price = chain.gas_price().await?;
        Ok(self.assess(amount_in, amount_out, gas_units, network_gas_price, direction))
    }

    pub fn assess(
        &self,
        amount_in: U256,
        amount_out: U256,
        gas_units: u64,
        network_gas_price: U256,
        direction: TradeDirection,
    ) -> ProfitAssessment {
        let gas_price = self.buffered_gas_price(network_gas_price);
        let gas_cost = gas_price.saturating_mul(U256::from(gas_units));
        let gas_cost_in_tokens = gas_cost_in_tokens(gas_cost, amount_in, amount_out, direction);
        let (net, denominator) = net_and_denominator(amount_in, amount_out, gas_cost_in_tokens, direction);

        let (profit_bps, accepted) = match net {
            Some(net) if !denominator.is_zero() => {
                let scaled = net.saturating_mul(U256::from(BPS));
                let threshold = denominator.saturating_mul(U256::from(self.min_profit_bps));
                (Some(scaled / denominator), scaled >= threshold)
            }
            _ => (None, false),
        };

        let assessment = ProfitAssessment {
            amount_in,
            amount_out,
            gas_units,
            gas_price,
            gas_cost,
            gas_cost_in_tokens,
            profit_bps,
            min_profit_bps: self.min_profit_bps,
            accepted,
        };

        tracing::debug!(
            direction = %direction,
            gas_price = %assessment.gas_price,
            gas_cost_in_tokens = %assessment.gas_cost_in_tokens,
            profit_bps = %assessment.profit_bps_display(),
            accepted,
            "Profitability assessed"
        );
        assessment
    }
}

/// BUY scales the gas cost by `amount_out / amount_in`; SELL uses it as is
pub fn gas_cost_in_tokens(
    gas_cost: U256,
    amount_in: U256,
    amount_out: U256,
    direction: TradeDirection,
) -> U256 {
    match direction {
        TradeDirection::Buy if amount_in.is_zero() => U256::MAX,
        TradeDirection::Buy => gas_cost.saturating_mul(amount_out) / amount_in,
        TradeDirection::Sell => gas_cost,
    }
}

/// BUY: `(out - gas) / in`; SELL: `(in - gas) / out`
fn net_and_denominator(
    amount_in: U256,
    amount_out: U256,
    gas_cost_in_tokens: U256,
    direction: TradeDirection,
) -> (Option<U256>, U256) {
    match direction {
        TradeDirection::Buy => (amount_out.checked_sub(gas_cost_in_tokens), amount_in),
        TradeDirection::Sell => (amount_in.checked_sub(gas_cost_in_tokens), amount_out),
    }
}

/// Profit fraction in basis points for a gas cost already in token terms
pub fn profit_bps(
    amount_in: U256,
    amount_out: U256,
    gas_cost_in_tokens: U256,
    direction: TradeDirection,
) -> Option<U256> {
    let (net, denominator) = net_and_denominator(amount_in, amount_out, gas_cost_in_tokens, direction);
    if denominator.is_zero() {
        return None;
    }
    net.map(|net| net.saturating_mul(U256::from(BPS)) / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> ProfitabilityEvaluator {
        ProfitabilityEvaluator::new(&ProfitabilityConfig::default())
    }

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn buy_with_small_gas_is_accepted() {
        // (1050 - 10) / 1000 = 104%
        assert_eq!(
            profit_bps(u(1000), u(1050), u(10), TradeDirection::Buy),
            Some(u(10_400))
        );

        // gas price 1 wei after buffer, 10 units -> gas cost 10, scaled by 1050/1000 -> 10
        let e = ProfitabilityEvaluator::new(&ProfitabilityConfig {
            gas_price_buffer_percent: 100,
            ..Default::default()
        });
        let assessment = e.assess(u(1000), u(1050), 10, u(1), TradeDirection::Buy);
        assert_eq!(assessment.gas_cost_in_tokens, u(10));
        assert!(assessment.accepted);
    }

    #[test]
    fn buy_eaten_by_gas_is_rejected() {
        // (1050 - 1049) / 1000 = 0.1% < 0.5%
        assert_eq!(
            profit_bps(u(1000), u(1050), u(1049), TradeDirection::Buy),
            Some(u(10))
        );

        let e = ProfitabilityEvaluator::new(&ProfitabilityConfig {
            gas_price_buffer_percent: 100,
            ..Default::default()
        });
        // gas cost 999 wei -> 999 * 1050 / 1000 = 1048 tokens
        let assessment = e.assess(u(1000), u(1050), 999, u(1), TradeDirection::Buy);
        assert_eq!(assessment.gas_cost_in_tokens, u(1048));
        assert!(!assessment.accepted);
    }

    #[test]
    fn threshold_is_inclusive_and_exact() {
        let e = ProfitabilityEvaluator::new(&ProfitabilityConfig {
            gas_price_buffer_percent: 100,
            ..Default::default()
        });
        // SELL: (in - gas) / out = 5 / 1000 = exactly 0.5%
        let assessment = e.assess(u(10), u(1000), 5, u(1), TradeDirection::Sell);
        assert_eq!(assessment.profit_bps, Some(u(50)));
        assert!(assessment.accepted);

        let assessment = e.assess(u(10), u(1000), 6, u(1), TradeDirection::Sell);
        assert!(!assessment.accepted);
    }

    #[test]
    fn gas_exceeding_proceeds_is_rejected() {
        let assessment = evaluator().assess(u(1000), u(1050), 21_000, u(1_000_000_000), TradeDirection::Sell);
        assert!(assessment.profit_bps.is_none());
        assert!(!assessment.accepted);
        assert_eq!(assessment.profit_bps_display(), "negative");
    }

    #[test]
    fn gas_price_is_buffered_and_capped() {
        let e = evaluator();
        let gwei = U256::from(1_000_000_000u64);
        assert_eq!(e.buffered_gas_price(u(20) * gwei), u(22) * gwei);
        assert_eq!(e.buffered_gas_price(u(500) * gwei), u(100) * gwei);
    }

    #[test]
    fn large_amounts_keep_full_precision() {
        // SELL with zero gas is accepted while in / out >= 0.5%, i.e. out <= 200 * in.
        // One wei past the mark on 1e30 is invisible to f64.
        let amount_in = U256::from(10u64).pow(u(30));
        let out_at_mark = amount_in * u(200);
        let e = ProfitabilityEvaluator::new(&ProfitabilityConfig {
            gas_price_buffer_percent: 100,
            ..Default::default()
        });
        assert!(e.assess(amount_in, out_at_mark, 0, u(0), TradeDirection::Sell).accepted);
        assert!(!e.assess(amount_in, out_at_mark + u(1), 0, u(0), TradeDirection::Sell).accepted);
    }
}
