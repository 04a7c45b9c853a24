//! Trading iteration
//!
//! `run_iteration(session_id)` walks one session through resolve, market
//! data, decision, sizing and execution, recording every branch in the
//! activity log. It holds no state across iterations.

use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::activity::ActivityLogger;
use crate::config::Config;
use crate::decision::{DecisionEngine, DecisionRequest};
use crate::executor::{ExecutionOutcome, TradeExecutor, TradeRequest};
use crate::market_data::MarketDataSource;
use crate::store::TradingStore;
use crate::strategy::SessionStrategyResolver;
use crate::types::{ActivityType, Strategy, TradingSession};
use crate::{Error, Result};

type LockMap = HashMap<Uuid, Arc<Mutex<()>>>;

/// Session-keyed async mutex. Holding the guard excludes every other
/// iteration of the same session in this process. An entry lives only
/// while some iteration holds or waits on it.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<std::sync::Mutex<LockMap>>,
}

/// Releases the session lock and drops its entry when nobody else wants it
pub struct SessionGuard {
    locks: Arc<std::sync::Mutex<LockMap>>,
    session_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: Uuid) -> SessionGuard {
        // built first so a cancelled wait still releases the entry
        let mut held = SessionGuard {
            locks: self.locks.clone(),
            session_id,
            guard: None,
        };
        let lock = lock_map(&self.locks)
            .entry(session_id)
            .or_default()
            .clone();
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Sessions with a held or awaited lock
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        let idle = locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.session_id);
        }
    }
}

// The map is never left inconsistent mid-update, so a poisoned lock is
// still usable.
fn lock_map(locks: &std::sync::Mutex<LockMap>) -> std::sync::MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct TradingEngine {
    store: Arc<dyn TradingStore>,
    activity: ActivityLogger,
    market: Arc<dyn MarketDataSource>,
    decisions: DecisionEngine,
    resolver: SessionStrategyResolver,
    executor: TradeExecutor,
    min_confidence: f64,
    locks: Option<SessionLocks>,
}

impl TradingEngine {
    pub fn new(
        store: Arc<dyn TradingStore>,
        activity: ActivityLogger,
        market: Arc<dyn MarketDataSource>,
        decisions: DecisionEngine,
        executor: TradeExecutor,
        config: &Config,
    ) -> Self {
        Self {
            store,
            activity,
            market,
            decisions,
            resolver: SessionStrategyResolver::new(),
            executor,
            min_confidence: config.decision.min_confidence,
            locks: config.serialize_sessions.then(SessionLocks::new),
        }
    }

    /// `true` when the iteration reached a terminal logged state (a trade or
    /// a deliberate HOLD), `false` when it failed or was skipped.
    pub async fn run_iteration(&self, session_id: Uuid) -> bool {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(session_id).await),
            None => None,
        };

        match self.iterate(session_id).await {
            Ok(completed) => completed,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Iteration aborted, results not recorded");
                false
            }
        }
    }

    /// One iteration for every active session, sessions in parallel
    pub async fn run_active_sessions(&self) -> Result<Vec<(Uuid, bool)>> {
        let sessions: Vec<Uuid> = self
            .store
            .sessions()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .map(|s| s.id)
            .collect();

        let results = join_all(sessions.iter().map(|id| self.run_iteration(*id))).await;
        Ok(sessions.into_iter().zip(results).collect())
    }

    /// Tick every `period` until `shutdown` resolves. A tick in progress
    /// always runs to completion; returns the number of ticks run.
    pub async fn watch<F>(&self, period: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        tokio::pin!(shutdown);
        let mut ticks = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            ticks += 1;
            match self.run_active_sessions().await {
                Ok(results) => {
                    let completed = results.iter().filter(|(_, ok)| *ok).count();
                    tracing::info!(sessions = results.len(), completed, "Tick finished");
                }
                Err(e) => tracing::error!(error = %e, "Failed to list sessions"),
            }
        }
        ticks
    }

    /// `Err` only when the activity log or a confirmed trade cannot be written
    async fn iterate(&self, session_id: Uuid) -> Result<bool> {
        let (session, strategy) = match self.load(session_id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.activity
                    .log(
                        session_id,
                        ActivityType::TradingCycleError,
                        json!({ "stage": "load", "error": e.to_string() }),
                    )
                    .await?;
                return Ok(false);
            }
        };

        let resolved = match self.resolver.resolve(&session, &strategy) {
            Ok(resolved) => resolved,
            Err(e) => {
                let activity_type = if e.is_skip() {
                    ActivityType::TradingSkipped
                } else {
                    ActivityType::TradingCycleError
                };
                tracing::info!(session_id = %session_id, reason = %e, "Skipping session");
                self.activity
                    .log(
                        session_id,
                        activity_type,
                        json!({ "reason": e.to_string(), "strategyId": strategy.id }),
                    )
                    .await?;
                return Ok(false);
            }
        };

        let budget = resolved.budget(session.allocated_amount);
        self.activity
            .log(
                session_id,
                ActivityType::TradingCycleStart,
                json!({
                    "pair": resolved.pair.to_string(),
                    "strategyType": resolved.strategy_type.as_str(),
                    "allocatedAmount": session.allocated_amount.to_string(),
                    "sizingFraction": resolved.sizing_fraction.to_string(),
                    "budget": budget.to_string(),
                }),
            )
            .await?;

        let market = match self.market.fetch(&resolved.pair).await {
            Ok(market) => market,
            Err(e) => {
                self.activity
                    .log(
                        session_id,
                        ActivityType::TradingCycleError,
                        json!({ "stage": "market_data", "pair": resolved.pair.to_string(), "error": e.to_string() }),
                    )
                    .await?;
                return Ok(false);
            }
        };

        self.activity
            .log(
                session_id,
                ActivityType::MarketAnalysis,
                json!({
                    "pair": resolved.pair.to_string(),
                    "currentPrice": market.current_price,
                    "rsi": market.rsi,
                    "volume": market.volume,
                    "liquidity": market.liquidity_or_volume(),
                    "historyPoints": market.price_history.len(),
                }),
            )
            .await?;

        let request = DecisionRequest::new(
            &market,
            resolved.pair.clone(),
            resolved.strategy_type,
            budget,
        );
        let decision = match self.decisions.decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                self.activity
                    .log(
                        session_id,
                        ActivityType::TradingError,
                        json!({ "stage": "decision", "error": e.to_string() }),
                    )
                    .await?;
                return Ok(false);
            }
        };

        self.activity
            .log_with_confidence(
                session_id,
                ActivityType::TradingDecision,
                json!({
                    "action": decision.action,
                    "suggestedAmount": decision.suggested_amount.to_string(),
                    "suggestedSlippagePercent": decision.suggested_slippage_percent,
                    "reasoning": decision.reasoning,
                }),
                decision.confidence,
            )
            .await?;

        let Some(direction) = decision.action.direction() else {
            self.hold(session_id, decision.confidence, json!({ "reason": "decision is HOLD" }))
                .await?;
            return Ok(true);
        };

        if decision.confidence < self.min_confidence {
            self.hold(
                session_id,
                decision.confidence,
                json!({
                    "reason": format!(
                        "confidence {} below action threshold {}",
                        decision.confidence, self.min_confidence
                    ),
                    "action": decision.action,
                }),
            )
            .await?;
            return Ok(true);
        }

        // quote-token terms until converted for the swap's source leg
        let amount = resolved.trade_amount(session.allocated_amount, decision.suggested_amount);
        if amount <= Decimal::ZERO {
            self.hold(
                session_id,
                decision.confidence,
                json!({ "reason": "trade amount is zero", "action": decision.action }),
            )
            .await?;
            return Ok(true);
        }

        let amount = match resolved.source_amount(amount, direction, market.current_price) {
            Ok(converted) if converted > Decimal::ZERO => converted,
            Ok(_) => {
                self.hold(
                    session_id,
                    decision.confidence,
                    json!({
                        "reason": "trade amount rounds to zero in the source token",
                        "action": decision.action,
                        "quoteAmount": amount.to_string(),
                    }),
                )
                .await?;
                return Ok(true);
            }
            Err(e) => {
                self.activity
                    .log(
                        session_id,
                        ActivityType::TradingError,
                        json!({ "stage": "sizing", "action": decision.action, "error": e.to_string() }),
                    )
                    .await?;
                return Ok(false);
            }
        };

        let trade = TradeRequest {
            session_id,
            wallet_address: session.wallet_address,
            direction,
            amount,
            pair: resolved.pair.clone(),
        };

        match self.executor.execute(&trade).await {
            Ok(ExecutionOutcome::Executed(record)) => {
                tracing::info!(
                    session_id = %session_id,
                    direction = %record.direction,
                    amount = %record.amount,
                    pair = %record.pair,
                    tx_hash = %record.tx_hash,
                    "Trade completed"
                );
                Ok(true)
            }
            Ok(ExecutionOutcome::DryRun(report)) => {
                self.hold(
                    session_id,
                    decision.confidence,
                    json!({
                        "reason": "dry run",
                        "dryRun": true,
                        "action": decision.action,
                        "amount": amount.to_string(),
                        "report": report,
                    }),
                )
                .await?;
                Ok(true)
            }
            // on chain but not fully written; not an execution failure
            Err(e @ Error::Unrecorded { .. }) => Err(e),
            Err(e @ Error::NotProfitable { .. }) => {
                self.hold(
                    session_id,
                    decision.confidence,
                    json!({
                        "reason": e.to_string(),
                        "action": decision.action,
                        "amount": amount.to_string(),
                    }),
                )
                .await?;
                Ok(true)
            }
            Err(e) => {
                self.activity
                    .log(
                        session_id,
                        ActivityType::TradingError,
                        json!({
                            "stage": "execution",
                            "action": decision.action,
                            "amount": amount.to_string(),
                            "pair": trade.pair.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    async fn load(&self, session_id: Uuid) -> Result<(TradingSession, Strategy)> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(Error::SessionNotFound(session_id))?;
        let strategy = self
            .store
            .strategy(session.strategy_id)
            .await?
            .ok_or(Error::StrategyNotFound(session.strategy_id))?;
        Ok((session, strategy))
    }

    async fn hold(&self, session_id: Uuid, confidence: f64, details: serde_json::Value) -> Result<()> {
        self.activity
            .log_with_confidence(session_id, ActivityType::TradingHold, details, confidence)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_lock_serializes_same_session() {
        let locks = Arc::new(SessionLocks::new());
        let session = Uuid::new_v4();

        let guard = locks.acquire(session).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(session).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn released_locks_are_evicted() {
        let locks = Arc::new(SessionLocks::new());
        let session = Uuid::new_v4();

        let guard = locks.acquire(session).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(session).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // the waiter still needs the entry
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());

        for _ in 0..100 {
            let _guard = locks.acquire(Uuid::new_v4()).await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_sessions_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4())).await;
        assert!(b.is_ok());
    }
}
