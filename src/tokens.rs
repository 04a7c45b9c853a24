//! Token registry
//!
//! Maps token symbols to contract addresses per chain. Decimals are not
//! stored here; they are always read from the token contract.

use alloy::primitives::{address, Address};
use std::collections::HashMap;

use crate::config::rpc::chains;
use crate::{Error, Result};

/// Well-known token addresses per chain
pub mod addresses {
    use super::*;

    // === Ethereum Mainnet ===
    pub const USDC_ETH: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    pub const WETH_ETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
    pub const WBTC_ETH: Address = address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599");
    pub const SHIB_ETH: Address = address!("95ad61b0a150d79219dcf64e1e6cc01f0b64c4ce");

    // === Arbitrum ===
    pub const USDC_ARB: Address = address!("af88d065e77c8cc2239327c5edb3a432268e5831");
    pub const WETH_ARB: Address = address!("82af49447d8a07e3bd95bd0d56f35241523fbab1");
    pub const WBTC_ARB: Address = address!("2f2a2543b76a4166549f7aab2e75bef0aefc5b0f");

    // === Base ===
    pub const USDC_BASE: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
    pub const WETH_BASE: Address = address!("4200000000000000000000000000000000000006");
}

/// Symbol lookups per chain
pub struct TokenRegistry {
    tokens: HashMap<(u64, &'static str), Address>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        use addresses::*;

        let mut tokens = HashMap::new();

        tokens.insert((chains::ETHEREUM, "USDC"), USDC_ETH);
        tokens.insert((chains::ETHEREUM, "WETH"), WETH_ETH);
        tokens.insert((chains::ETHEREUM, "WBTC"), WBTC_ETH);
        tokens.insert((chains::ETHEREUM, "SHIB"), SHIB_ETH);

        tokens.insert((chains::ARBITRUM, "USDC"), USDC_ARB);
        tokens.insert((chains::ARBITRUM, "WETH"), WETH_ARB);
        tokens.insert((chains::ARBITRUM, "WBTC"), WBTC_ARB);

        tokens.insert((chains::BASE, "USDC"), USDC_BASE);
        tokens.insert((chains::BASE, "WETH"), WETH_BASE);

        Self { tokens }
    }

    /// Contract address for `symbol` on `chain_id` (case-insensitive)
    pub fn get(&self, chain_id: u64, symbol: &str) -> Option<Address> {
        let symbol = symbol.to_uppercase();
        self.tokens
            .iter()
            .find(|((chain, sym), _)| *chain == chain_id && *sym == symbol)
            .map(|(_, address)| *address)
    }

    /// Like [`get`](Self::get) but a missing token is a configuration error
    pub fn resolve(&self, chain_id: u64, symbol: &str) -> Result<Address> {
        self.get(chain_id, symbol).ok_or_else(|| {
            Error::Config(format!(
                "Token {} has no known address on chain {}",
                symbol, chain_id
            ))
        })
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: std::sync::OnceLock<TokenRegistry> = std::sync::OnceLock::new();

/// Get the global token registry
pub fn registry() -> &'static TokenRegistry {
    REGISTRY.get_or_init(TokenRegistry::new)
}
