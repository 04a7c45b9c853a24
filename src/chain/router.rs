//! Alloy-backed chain client for ERC-20 tokens and a Uniswap-V2-style router

use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use std::time::Duration;

use super::{ChainClient, SwapParams};
use crate::wallet::SessionSigner;
use crate::{Error, Result};

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address owner) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts);
    }
}

/// Chain client talking JSON-RPC over HTTP.
///
/// Read-only calls use an unsigned provider; writes build a provider around
/// the session signer for the duration of one transaction.
#[derive(Debug, Clone)]
pub struct AlloyChainClient {
    rpc_url: url::Url,
    confirmation_timeout: Duration,
}

impl AlloyChainClient {
    pub fn new(rpc_url: &str, confirmation_timeout: Duration) -> Result<Self> {
        let rpc_url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            rpc_url,
            confirmation_timeout,
        })
    }

    fn reader(&self) -> impl Provider + Clone {
        ProviderBuilder::new().connect_http(self.rpc_url.clone())
    }

    /// Wait for the receipt; a revert or a timeout is a failure
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
        what: &str,
    ) -> Result<B256> {
        let tx_hash = *pending.tx_hash();
        tracing::info!(%tx_hash, what, "Transaction submitted, awaiting confirmation");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| Error::Chain(format!("{} {} not confirmed: {}", what, tx_hash, e)))?;

        if !receipt.status() {
            return Err(Error::Chain(format!("{} {} reverted", what, tx_hash)));
        }

        tracing::info!(
            %tx_hash,
            what,
            block = ?receipt.block_number(),
            gas_used = receipt.gas_used(),
            "Transaction confirmed"
        );
        Ok(receipt.transaction_hash())
    }
}

fn call_error(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Chain(format!("{} failed: {}", what, e))
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let erc20 = IERC20::new(token, self.reader());
        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| call_error("decimals()", e))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = IERC20::new(token, self.reader());
        erc20
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| call_error("balanceOf()", e))
    }

    async fn quote_amount_out(
        &self,
        router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<U256> {
        let router = IUniswapV2Router02::new(router, self.reader());
        let amounts = router
            .getAmountsOut(amount_in, path.to_vec())
            .call()
            .await
            .map_err(|e| call_error("getAmountsOut()", e))?;

        amounts
            .last()
            .copied()
            .ok_or_else(|| Error::Chain("getAmountsOut() returned no amounts".to_string()))
    }

    async fn gas_price(&self) -> Result<U256> {
        let price = self
            .reader()
            .get_gas_price()
            .await
            .map_err(|e| call_error("eth_gasPrice", e))?;
        Ok(U256::from(price))
    }

    async fn estimate_approve_gas(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<u64> {
        let erc20 = IERC20::new(token, self.reader());
        erc20
            .approve(spender, amount)
            .from(owner)
            .estimate_gas()
            .await
            .map_err(|e| call_error("approve() gas estimate", e))
    }

    async fn estimate_swap_gas(&self, owner: Address, params: &SwapParams) -> Result<u64> {
        let router = IUniswapV2Router02::new(params.router, self.reader());
        router
            .swapExactTokensForTokens(
                params.amount_in,
                params.amount_out_min,
                params.path.clone(),
                params.recipient,
                params.deadline,
            )
            .from(owner)
            .estimate_gas()
            .await
            .map_err(|e| call_error("swap gas estimate", e))
    }

    async fn approve(
        &self,
        signer: &SessionSigner,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<B256> {
        let provider = ProviderBuilder::new()
            .wallet(signer.wallet().clone())
            .connect_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, provider);

        let pending = erc20
            .approve(spender, amount)
            .from(signer.address())
            .send()
            .await
            .map_err(|e| call_error("approve() submission", e))?;

        self.confirm(pending, "approve").await
    }

    async fn swap(&self, signer: &SessionSigner, params: &SwapParams) -> Result<B256> {
        let provider = ProviderBuilder::new()
            .wallet(signer.wallet().clone())
            .connect_http(self.rpc_url.clone());
        let router = IUniswapV2Router02::new(params.router, provider);

        let pending = router
            .swapExactTokensForTokens(
                params.amount_in,
                params.amount_out_min,
                params.path.clone(),
                params.recipient,
                params.deadline,
            )
            .from(signer.address())
            .send()
            .await
            .map_err(|e| call_error("swap submission", e))?;

        self.confirm(pending, "swap").await
    }
}
