use super::local_store::{Collection, LocalNamespace};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

pub const EVENT_DEDUP_MERGE: &str = "attendance_dedup_merge";
pub const EVENT_DEDUP_OUTDATED: &str = "attendance_dedup_outdated";
pub const EVENT_SERVER_REJECTED: &str = "attendance_server_rejected";
pub const EVENT_SERVER_ERROR: &str = "attendance_server_error";
pub const EVENT_QUEUE_FLUSH: &str = "offline_queue_flush";
pub const EVENT_GATE_SCAN: &str = "attendance_qr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub payload: Value,
    pub timestamp: i64,
}

/// 直近 `max_events` 件だけを残す副作用ログ。容量不足時は失敗させずに全消去する。
pub struct AnalyticsLog {
    namespace: LocalNamespace,
    max_events: usize,
    gate: Mutex<()>,
}

impl AnalyticsLog {
    pub fn new(namespace: LocalNamespace, max_events: usize) -> Self {
        Self {
            namespace,
            max_events,
            gate: Mutex::new(()),
        }
    }

    pub fn track(&self, name: &str, payload: Value) -> Result<(), AppError> {
        if self.max_events == 0 {
            return Ok(());
        }

        let _guard = self
            .gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))?;

        // 壊れた解析ログは捨てて作り直す
        let mut events: Vec<AnalyticsEvent> =
            self.namespace.load(Collection::Analytics).unwrap_or_default();
        events.push(AnalyticsEvent {
            name: name.to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        });
        if events.len() > self.max_events {
            let overflow = events.len() - self.max_events;
            events.drain(..overflow);
        }

        match self.namespace.save(Collection::Analytics, &events) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() => {
                tracing::warn!(
                    target: "attendance::storage",
                    error = %err,
                    "analytics log over quota; clearing"
                );
                self.namespace.remove(Collection::Analytics)
            }
            Err(err) => Err(err),
        }
    }

    pub fn events(&self) -> Result<Vec<AnalyticsEvent>, AppError> {
        self.namespace.load(Collection::Analytics)
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.namespace.remove(Collection::Analytics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryBlobStorage;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn keeps_only_latest_events() {
        let ns = LocalNamespace::new(Arc::new(MemoryBlobStorage::new()), "safepath");
        let log = AnalyticsLog::new(ns, 3);
        for i in 0..5 {
            log.track(EVENT_DEDUP_MERGE, json!({ "n": i })).unwrap();
        }

        let events = log.events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload, json!({ "n": 2 }));
        assert_eq!(events[2].payload, json!({ "n": 4 }));
    }

    #[test]
    fn quota_exhaustion_clears_instead_of_failing() {
        let storage = Arc::new(MemoryBlobStorage::with_quota(64));
        let log = AnalyticsLog::new(LocalNamespace::new(storage, "p"), 100);

        let big = "x".repeat(80);
        log.track(EVENT_SERVER_ERROR, json!({ "error": big })).unwrap();
        assert!(log.events().unwrap().is_empty());
    }
}
