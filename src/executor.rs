//! Trade executor
//!
//! Runs the approve-then-swap sequence for one trade against the session's
//! delegated wallet. Steps are strictly ordered; each must succeed before
//! the next starts.
//!
//! Outcomes:
//! - confirmed swap: one COMPLETED [`TradeRecord`] plus TRADE_EXECUTION_SUCCESS
//! - profitability veto: [`Error::NotProfitable`], nothing persisted, no
//!   failure log (the caller records the HOLD)
//! - anything else before the swap confirms: TRADE_EXECUTION_FAILED, no
//!   record, error re-raised
//! - a confirmed swap whose record or success entry cannot be written:
//!   [`Error::Unrecorded`], never reported as an execution failure

use alloy::primitives::{Address, B256, U256};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::activity::ActivityLogger;
use crate::chain::{ChainClient, SwapParams};
use crate::config::{ChainConfig, Config, ExecutionConfig};
use crate::profitability::ProfitabilityEvaluator;
use crate::store::TradingStore;
use crate::tokens;
use crate::types::{ActivityType, TradeDirection, TradeRecord, TradeStatus, TradingPair};
use crate::units::{format_units, parse_units};
use crate::wallet::{KeyStore, SessionSigner};
use crate::{Error, Result};

const BPS: u64 = 10_000;

/// One logical trade attempt
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub session_id: Uuid,
    pub wallet_address: Address,
    pub direction: TradeDirection,
    /// Human amount of the source token
    pub amount: Decimal,
    pub pair: TradingPair,
}

/// What a dry run would have submitted
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunReport {
    pub amount_in: U256,
    pub quoted_out: U256,
    pub min_amount_out: U256,
    pub gas_units: u64,
    pub profit_bps: String,
}

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Executed(TradeRecord),
    DryRun(DryRunReport),
}

/// A swap with a successful receipt, not yet recorded
#[derive(Debug, Clone)]
struct ConfirmedSwap {
    approve_tx: B256,
    swap_tx: B256,
    amount_in: U256,
    quoted_out: U256,
    amount_out_min: U256,
    gas_units: u64,
    profit_bps: String,
}

enum Submission {
    DryRun(DryRunReport),
    Confirmed(ConfirmedSwap),
}

/// Quote minus slippage, rounded toward zero
pub fn min_amount_out(quoted: U256, slippage_bps: u32) -> U256 {
    let keep = BPS.saturating_sub(u64::from(slippage_bps));
    quoted.saturating_mul(U256::from(keep)) / U256::from(BPS)
}

pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    keys: Arc<dyn KeyStore>,
    store: Arc<dyn TradingStore>,
    activity: ActivityLogger,
    evaluator: ProfitabilityEvaluator,
    chain_config: ChainConfig,
    execution: ExecutionConfig,
    dry_run: bool,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        keys: Arc<dyn KeyStore>,
        store: Arc<dyn TradingStore>,
        activity: ActivityLogger,
        config: &Config,
    ) -> Self {
        Self {
            chain,
            keys,
            store,
            activity,
            evaluator: ProfitabilityEvaluator::new(&config.profitability),
            chain_config: config.chain.clone(),
            execution: config.execution.clone(),
            dry_run: false,
        }
    }

    /// Stop after the profitability check; never sign or submit
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn execute(&self, request: &TradeRequest) -> Result<ExecutionOutcome> {
        self.activity
            .log(
                request.session_id,
                ActivityType::TradeExecutionStart,
                json!({
                    "action": request.direction.to_string(),
                    "amount": request.amount.normalize().to_string(),
                    "pair": request.pair.to_string(),
                    "dryRun": self.dry_run,
                }),
            )
            .await?;

        let confirmed = match self.run(request).await {
            Ok(Submission::DryRun(report)) => return Ok(ExecutionOutcome::DryRun(report)),
            Ok(Submission::Confirmed(swap)) => swap,
            Err(e @ Error::NotProfitable { .. }) => return Err(e),
            Err(e) => {
                tracing::error!(
                    session_id = %request.session_id,
                    pair = %request.pair,
                    error = %e,
                    "Trade execution failed"
                );
                let logged = self
                    .activity
                    .log(
                        request.session_id,
                        ActivityType::TradeExecutionFailed,
                        json!({
                            "action": request.direction.to_string(),
                            "amount": request.amount.normalize().to_string(),
                            "pair": request.pair.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                if let Err(log_err) = logged {
                    tracing::error!(error = %log_err, "Failed to record execution failure");
                }
                return Err(e);
            }
        };

        // the swap is on chain from here on
        self.record(request, confirmed)
            .await
            .map(ExecutionOutcome::Executed)
    }

    async fn run(&self, request: &TradeRequest) -> Result<Submission> {
        let chain_id = self.chain_config.chain_id;
        let router = self.chain_config.router()?;
        let wallet = request.wallet_address;

        // 1. token addresses and decimals
        let (source_symbol, dest_symbol) = request.pair.legs(request.direction);
        let registry = tokens::registry();
        let source = registry.resolve(chain_id, source_symbol)?;
        let dest = registry.resolve(chain_id, dest_symbol)?;
        let source_decimals = self.chain.token_decimals(source).await?;
        let dest_decimals = self.chain.token_decimals(dest).await?;

        // 2. smallest units
        let amount_in = parse_units(request.amount, source_decimals)?;
        if amount_in.is_zero() {
            return Err(Error::InvalidArgument(format!(
                "{} {} is below one unit of the token",
                request.amount, source_symbol
            )));
        }

        let balance = self.chain.balance_of(source, wallet).await?;
        if balance < amount_in {
            return Err(Error::InsufficientBalance {
                required: format!("{} {}", format_units(amount_in, source_decimals), source_symbol),
                available: format!("{} {}", format_units(balance, source_decimals), source_symbol),
            });
        }

        // 3. quote and slippage bound
        let path = vec![source, dest];
        let quoted_out = self.chain.quote_amount_out(router, amount_in, &path).await?;
        let amount_out_min = min_amount_out(quoted_out, self.execution.slippage_bps);
        tracing::debug!(
            pair = %request.pair,
            amount_in = %amount_in,
            quoted_out = %format_units(quoted_out, dest_decimals),
            min_amount_out = %amount_out_min,
            "Router quote"
        );

        let mut params = SwapParams {
            router,
            amount_in,
            amount_out_min,
            path,
            recipient: wallet,
            deadline: self.deadline(),
        };

        // 4. gas and profitability
        let approve_gas = self
            .chain
            .estimate_approve_gas(wallet, source, router, amount_in)
            .await?;
        let swap_gas = match self.chain.estimate_swap_gas(wallet, &params).await {
            Ok(gas) => gas,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = self.execution.fallback_swap_gas,
                    "Swap gas estimate unavailable before approval, using fallback"
                );
                self.execution.fallback_swap_gas
            }
        };
        let gas_units = approve_gas.saturating_add(swap_gas);

        let assessment = self
            .evaluator
            .is_profitable(
                self.chain.as_ref(),
                amount_in,
                quoted_out,
                gas_units,
                request.direction,
            )
            .await?;
        if !assessment.accepted {
            return Err(Error::NotProfitable {
                profit_bps: assessment.profit_bps_display(),
                min_profit_bps: assessment.min_profit_bps,
            });
        }

        if self.dry_run {
            tracing::info!(session_id = %request.session_id, "Dry run, not submitting");
            return Ok(Submission::DryRun(DryRunReport {
                amount_in,
                quoted_out,
                min_amount_out: amount_out_min,
                gas_units,
                profit_bps: assessment.profit_bps_display(),
            }));
        }

        // 5-6. sign and submit; the signer does not outlive this block
        let (approve_tx, swap_tx) = {
            let signer = self.signer_for(request).await?;
            let approve_tx = self
                .chain
                .approve(&signer, source, router, amount_in)
                .await?;
            params.deadline = self.deadline();
            let swap_tx = self.chain.swap(&signer, &params).await?;
            (approve_tx, swap_tx)
        };

        Ok(Submission::Confirmed(ConfirmedSwap {
            approve_tx,
            swap_tx,
            amount_in,
            quoted_out,
            amount_out_min,
            gas_units,
            profit_bps: assessment.profit_bps_display(),
        }))
    }

    /// 7. one COMPLETED record, then the success entry
    async fn record(&self, request: &TradeRequest, swap: ConfirmedSwap) -> Result<TradeRecord> {
        let unrecorded = |reason: String| {
            tracing::error!(
                session_id = %request.session_id,
                tx_hash = %swap.swap_tx,
                reason = %reason,
                "Confirmed swap not recorded"
            );
            Error::Unrecorded {
                tx_hash: swap.swap_tx.to_string(),
                reason,
            }
        };

        let record = TradeRecord {
            id: Uuid::new_v4(),
            session_id: request.session_id,
            wallet_address: request.wallet_address,
            direction: request.direction,
            amount: request.amount.normalize().to_string(),
            pair: request.pair.to_string(),
            status: TradeStatus::Completed,
            timestamp: Utc::now(),
            tx_hash: swap.swap_tx.to_string(),
        };
        self.store
            .insert_trade(record.clone())
            .await
            .map_err(|e| unrecorded(format!("trade record not saved: {}", e)))?;

        self.activity
            .log(
                request.session_id,
                ActivityType::TradeExecutionSuccess,
                json!({
                    "action": request.direction.to_string(),
                    "amount": record.amount,
                    "pair": record.pair,
                    "txHash": record.tx_hash,
                    "approveTxHash": swap.approve_tx.to_string(),
                    "amountIn": swap.amount_in.to_string(),
                    "quotedOut": swap.quoted_out.to_string(),
                    "minAmountOut": swap.amount_out_min.to_string(),
                    "gasUnits": swap.gas_units,
                    "profitBps": swap.profit_bps,
                }),
            )
            .await
            .map_err(|e| unrecorded(format!("success entry not logged: {}", e)))?;

        Ok(record)
    }

    /// Fetch key material and build a signer for the session's wallet
    async fn signer_for(&self, request: &TradeRequest) -> Result<SessionSigner> {
        let key = self
            .keys
            .private_key(request.session_id)
            .await?
            .ok_or_else(|| {
                Error::Wallet(format!("No key material for session {}", request.session_id))
            })?;
        let signer = SessionSigner::from_secret(&key)?;

        if signer.address() != request.wallet_address {
            return Err(Error::Wallet(format!(
                "Key for session {} controls {}, not the delegated wallet {}",
                request.session_id,
                signer.address(),
                request.wallet_address
            )));
        }
        Ok(signer)
    }

    fn deadline(&self) -> U256 {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        U256::from(now.saturating_add(self.execution.deadline_secs))
    }
}
