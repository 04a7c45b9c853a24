//! Persistence for sessions, strategies, trades and the activity log
//!
//! Sessions and strategies are read-only to the engine. Trades and
//! activity entries are append-only. [`MemoryStore`] keeps everything in
//! memory and optionally snapshots it to a JSON file after every write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{ActivityLogEntry, Strategy, TradeRecord, TradingSession};
use crate::{Error, Result};

#[async_trait]
pub trait TradingStore: Send + Sync {
    async fn session(&self, id: Uuid) -> Result<Option<TradingSession>>;

    async fn strategy(&self, id: Uuid) -> Result<Option<Strategy>>;

    async fn sessions(&self) -> Result<Vec<TradingSession>>;

    async fn insert_trade(&self, trade: TradeRecord) -> Result<()>;

    async fn append_activity(&self, entry: ActivityLogEntry) -> Result<()>;

    /// Trades of a session, oldest first
    async fn trades_for_session(&self, session_id: Uuid) -> Result<Vec<TradeRecord>>;

    /// Activity of a session, oldest first
    async fn activity_for_session(&self, session_id: Uuid) -> Result<Vec<ActivityLogEntry>>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreState {
    #[serde(default)]
    sessions: Vec<TradingSession>,
    #[serde(default)]
    strategies: Vec<Strategy>,
    #[serde(default)]
    trades: Vec<TradeRecord>,
    #[serde(default)]
    activity: Vec<ActivityLogEntry>,
}

/// Thread-safe in-memory store with an optional JSON snapshot file
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path`, or start empty if it doesn't exist.
    /// Later writes are saved back to `path`.
    pub async fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)
                .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?
        } else {
            tracing::info!(path = %path.display(), "No store snapshot found, starting empty");
            StoreState::default()
        };

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            path: Some(path),
        })
    }

    /// Add or replace a session
    pub async fn insert_session(&self, session: TradingSession) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.retain(|s| s.id != session.id);
        state.sessions.push(session);
        self.persist(&state).await
    }

    /// Add or replace a strategy
    pub async fn insert_strategy(&self, strategy: Strategy) -> Result<()> {
        let mut state = self.state.write().await;
        state.strategies.retain(|s| s.id != strategy.id);
        state.strategies.push(strategy);
        self.persist(&state).await
    }

    pub async fn save(&self) -> Result<()> {
        let state = self.state.read().await;
        self.persist(&state).await
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl TradingStore for MemoryStore {
    async fn session(&self, id: Uuid) -> Result<Option<TradingSession>> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn strategy(&self, id: Uuid) -> Result<Option<Strategy>> {
        let state = self.state.read().await;
        Ok(state.strategies.iter().find(|s| s.id == id).cloned())
    }

    async fn sessions(&self) -> Result<Vec<TradingSession>> {
        Ok(self.state.read().await.sessions.clone())
    }

    async fn insert_trade(&self, trade: TradeRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.trades.push(trade);
        if let Err(e) = self.persist(&state).await {
            state.trades.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn append_activity(&self, entry: ActivityLogEntry) -> Result<()> {
        let mut state = self.state.write().await;
        state.activity.push(entry);
        if let Err(e) = self.persist(&state).await {
            state.activity.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn trades_for_session(&self, session_id: Uuid) -> Result<Vec<TradeRecord>> {
        let state = self.state.read().await;
        Ok(state
            .trades
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn activity_for_session(&self, session_id: Uuid) -> Result<Vec<ActivityLogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .activity
            .iter()
            .filter(|a| a.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityType, RiskLevel, StrategyType, TradeDirection, TradeStatus};
    use alloy::primitives::Address;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn session() -> TradingSession {
        TradingSession {
            id: Uuid::new_v4(),
            user_address: Address::ZERO,
            wallet_address: Address::repeat_byte(0x11),
            allocated_amount: dec!(1000),
            is_active: true,
            strategy_id: Uuid::new_v4(),
        }
    }

    fn trade(session_id: Uuid) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            session_id,
            wallet_address: Address::repeat_byte(0x11),
            direction: TradeDirection::Buy,
            amount: "80".to_string(),
            pair: "USDC/WETH".to_string(),
            status: TradeStatus::Completed,
            timestamp: Utc::now(),
            tx_hash: "0xabc".to_string(),
        }
    }

    #[tokio::test]
    async fn queries_filter_by_session() {
        let store = MemoryStore::new();
        let a = session();
        let b = session();
        store.insert_session(a.clone()).await.unwrap();
        store.insert_session(b.clone()).await.unwrap();

        store.insert_trade(trade(a.id)).await.unwrap();
        store.insert_trade(trade(a.id)).await.unwrap();
        store.insert_trade(trade(b.id)).await.unwrap();

        assert_eq!(store.trades_for_session(a.id).await.unwrap().len(), 2);
        assert_eq!(store.trades_for_session(b.id).await.unwrap().len(), 1);
        assert!(store.session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inserting_session_twice_replaces_it() {
        let store = MemoryStore::new();
        let mut s = session();
        store.insert_session(s.clone()).await.unwrap();
        s.is_active = false;
        store.insert_session(s.clone()).await.unwrap();

        let sessions = store.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].is_active);
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let s = session();
        let strategy = Strategy {
            id: s.strategy_id,
            strategy_type: StrategyType::Arbitrage,
            risk_level: RiskLevel::Medium,
            enabled: true,
            config: json!({}),
        };
        {
            let store = MemoryStore::load_or_create(&path).await.unwrap();
            store.insert_session(s.clone()).await.unwrap();
            store.insert_strategy(strategy).await.unwrap();
            store.insert_trade(trade(s.id)).await.unwrap();
            store
                .append_activity(ActivityLogEntry {
                    session_id: s.id,
                    activity_type: ActivityType::TradingHold,
                    details: json!({ "reason": "test" }),
                    confidence: Some(0.5),
                    is_manual_intervention: false,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }

        let reloaded = MemoryStore::load_or_create(&path).await.unwrap();
        assert!(reloaded.session(s.id).await.unwrap().is_some());
        assert!(reloaded.strategy(s.strategy_id).await.unwrap().is_some());
        assert_eq!(reloaded.trades_for_session(s.id).await.unwrap().len(), 1);
        let activity = reloaded.activity_for_session(s.id).await.unwrap();
        assert_eq!(activity[0].activity_type, ActivityType::TradingHold);
    }

    #[tokio::test]
    async fn failed_save_leaves_no_trade_or_entry_behind() {
        let dir = tempfile::tempdir().unwrap();
        // parent directory never exists, so every save fails
        let path = dir.path().join("missing").join("store.json");
        let store = MemoryStore::load_or_create(&path).await.unwrap();
        let session_id = Uuid::new_v4();

        let err = store.insert_trade(trade(session_id)).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.trades_for_session(session_id).await.unwrap().is_empty());

        let err = store
            .append_activity(ActivityLogEntry {
                session_id,
                activity_type: ActivityType::TradeExecutionSuccess,
                details: json!({}),
                confidence: None,
                is_manual_intervention: false,
                timestamp: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.activity_for_session(session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = MemoryStore::load_or_create(&path).await.err().unwrap();
        assert!(matches!(err, Error::Store(_)));
    }
}
