//! RPC endpoint resolution
//!
//! Priority, per chain:
//! 1. Per-chain env vars (ETH_RPC_URL, ARBITRUM_RPC_URL, BASE_RPC_URL)
//! 2. ALCHEMY_API_KEY - builds URLs automatically
//! 3. Public RPC fallbacks - rate limited, for testing only
//!
//! An explicit `chain.rpc_url` in the config file bypasses all of this.

use std::collections::HashMap;

/// RPC URLs indexed by chain ID
#[derive(Debug, Clone)]
pub struct RpcConfig {
    urls: HashMap<u64, String>,
}

/// Chain ID constants
pub mod chains {
    pub const ETHEREUM: u64 = 1;
    pub const ARBITRUM: u64 = 42161;
    pub const BASE: u64 = 8453;
}

mod env_vars {
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const ARBITRUM_RPC_URL: &str = "ARBITRUM_RPC_URL";
    pub const BASE_RPC_URL: &str = "BASE_RPC_URL";
    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
}

mod public_rpcs {
    pub const ETHEREUM: &str = "https://eth.llamarpc.com";
    pub const ARBITRUM: &str = "https://arb1.arbitrum.io/rpc";
    pub const BASE: &str = "https://mainnet.base.org";
}

/// (chain, env var, alchemy subdomain, public fallback)
const CHAINS: [(u64, &str, &str, &str); 3] = [
    (
        chains::ETHEREUM,
        env_vars::ETH_RPC_URL,
        "eth-mainnet",
        public_rpcs::ETHEREUM,
    ),
    (
        chains::ARBITRUM,
        env_vars::ARBITRUM_RPC_URL,
        "arb-mainnet",
        public_rpcs::ARBITRUM,
    ),
    (
        chains::BASE,
        env_vars::BASE_RPC_URL,
        "base-mainnet",
        public_rpcs::BASE,
    ),
];

impl RpcConfig {
    /// Resolve RPC URLs for every supported chain from the environment
    pub fn from_env() -> Self {
        let alchemy_key = std::env::var(env_vars::ALCHEMY_API_KEY).ok();
        let mut urls = HashMap::new();

        for (chain_id, var, alchemy_subdomain, public) in CHAINS {
            let url = if let Ok(url) = std::env::var(var) {
                tracing::debug!(chain_id, var, "Using per-chain RPC URL");
                url
            } else if let Some(key) = &alchemy_key {
                format!("https://{}.g.alchemy.com/v2/{}", alchemy_subdomain, key)
            } else {
                tracing::warn!(chain_id, "No RPC configured, using public RPC (rate limited)");
                public.to_string()
            };
            urls.insert(chain_id, url);
        }

        Self { urls }
    }

    /// Create with explicit RPC URLs
    pub fn with_urls(urls: HashMap<u64, String>) -> Self {
        Self { urls }
    }

    /// Get RPC URL for a chain
    pub fn get(&self, chain_id: u64) -> Option<&str> {
        self.urls.get(&chain_id).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_url() {
        let mut urls = HashMap::new();
        urls.insert(1, "https://custom.rpc".to_string());
        let config = RpcConfig::with_urls(urls);

        assert_eq!(config.get(1), Some("https://custom.rpc"));
        assert_eq!(config.get(999), None);
    }

    #[test]
    fn test_every_supported_chain_resolves() {
        let config = RpcConfig::from_env();

        assert!(config.get(chains::ETHEREUM).is_some());
        assert!(config.get(chains::ARBITRUM).is_some());
        assert!(config.get(chains::BASE).is_some());
        assert!(config.get(137).is_none());
    }
}
