//! On-chain access
//!
//! Everything the executor needs from the chain sits behind [`ChainClient`]
//! so the iteration can run against a fake in tests.

mod router;

pub use router::AlloyChainClient;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::wallet::SessionSigner;
use crate::Result;

/// Arguments of `swapExactTokensForTokens`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub router: Address,
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub recipient: Address,
    /// Unix timestamp after which the router rejects the swap
    pub deadline: U256,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// ERC-20 `decimals()`
    async fn token_decimals(&self, token: Address) -> Result<u8>;

    /// ERC-20 `balanceOf(owner)`
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    /// Final element of the router's `getAmountsOut(amount_in, path)`
    async fn quote_amount_out(&self, router: Address, amount_in: U256, path: &[Address])
        -> Result<U256>;

    /// Current network gas price (wei)
    async fn gas_price(&self) -> Result<U256>;

    async fn estimate_approve_gas(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<u64>;

    async fn estimate_swap_gas(&self, owner: Address, params: &SwapParams) -> Result<u64>;

    /// Submit `approve(spender, amount)` and wait for a successful receipt
    async fn approve(
        &self,
        signer: &SessionSigner,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256>;

    /// Submit the swap and wait for a successful receipt
    async fn swap(&self, signer: &SessionSigner, params: &SwapParams) -> Result<B256>;
}
