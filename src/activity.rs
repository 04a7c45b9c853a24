//! Activity log
//!
//! Every step of an iteration leaves an entry in the store. Entries are also
//! emitted as tracing events and, when configured, appended to a JSONL file.

use chrono::Utc;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::TradingStore;
use crate::types::{ActivityLogEntry, ActivityType};
use crate::Result;

/// Appends entries to a JSONL file
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &ActivityLogEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn TradingStore>,
    audit: Option<Arc<Mutex<AuditLogWriter>>>,
}

impl ActivityLogger {
    pub fn new(store: Arc<dyn TradingStore>) -> Self {
        Self { store, audit: None }
    }

    /// Also mirror every entry to a JSONL file
    pub fn with_audit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(AuditLogWriter { path: path.into() })));
        self
    }

    pub async fn log(&self, session_id: Uuid, activity_type: ActivityType, details: Value) -> Result<()> {
        self.append(session_id, activity_type, details, None, false).await
    }

    pub async fn log_with_confidence(
        &self,
        session_id: Uuid,
        activity_type: ActivityType,
        details: Value,
        confidence: f64,
    ) -> Result<()> {
        self.append(session_id, activity_type, details, Some(confidence), false)
            .await
    }

    /// Operator note, flagged as a manual intervention
    pub async fn log_manual(&self, session_id: Uuid, details: Value) -> Result<()> {
        self.append(session_id, ActivityType::ManualIntervention, details, None, true)
            .await
    }

    async fn append(
        &self,
        session_id: Uuid,
        activity_type: ActivityType,
        details: Value,
        confidence: Option<f64>,
        is_manual_intervention: bool,
    ) -> Result<()> {
        let entry = ActivityLogEntry {
            session_id,
            activity_type,
            details,
            confidence,
            is_manual_intervention,
            timestamp: Utc::now(),
        };

        tracing::info!(
            session_id = %session_id,
            activity = %activity_type,
            confidence = ?confidence,
            details = %entry.details,
            "Activity"
        );

        if let Some(audit) = &self.audit {
            let writer = audit.lock().await;
            if let Err(e) = writer.write(&entry) {
                tracing::warn!(error = %e, "Failed to write audit log entry");
            }
        }

        self.store.append_activity(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn entries_reach_store_and_audit_file() {
        let dir = tempfile::tempdir().unwrap();
        let audit_path = dir.path().join("activity.jsonl");
        let store = Arc::new(MemoryStore::new());
        let logger = ActivityLogger::new(store.clone()).with_audit_file(&audit_path);
        let session = Uuid::new_v4();

        logger
            .log(session, ActivityType::TradingCycleStart, json!({ "pair": "USDC/WETH" }))
            .await
            .unwrap();
        logger
            .log_with_confidence(session, ActivityType::TradingDecision, json!({ "action": "BUY" }), 0.8)
            .await
            .unwrap();
        logger
            .log_manual(session, json!({ "message": "paused funding" }))
            .await
            .unwrap();

        let entries = store.activity_for_session(session).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].confidence, Some(0.8));
        assert!(!entries[1].is_manual_intervention);
        assert_eq!(entries[2].activity_type, ActivityType::ManualIntervention);
        assert!(entries[2].is_manual_intervention);

        let lines = std::fs::read_to_string(&audit_path).unwrap();
        let parsed: Vec<Value> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0]["activityType"], "TRADING_CYCLE_START");
        assert_eq!(parsed[2]["isManualIntervention"], true);
    }

    #[tokio::test]
    async fn unwritable_audit_file_does_not_fail_logging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        // A directory cannot be opened for appending
        let logger = ActivityLogger::new(store.clone()).with_audit_file(dir.path());
        let session = Uuid::new_v4();

        logger
            .log(session, ActivityType::TradingHold, json!({}))
            .await
            .unwrap();
        assert_eq!(store.activity_for_session(session).await.unwrap().len(), 1);
    }
}
