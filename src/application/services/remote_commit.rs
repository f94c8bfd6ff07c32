use super::analytics_log::{AnalyticsLog, EVENT_SERVER_ERROR, EVENT_SERVER_REJECTED};
use crate::application::ports::remote_store::RemoteAttendanceStore;
use crate::domain::entities::{AttendanceRecord, CommitOutcome};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// リモートストアへのコミットを `saved | rejected_outdated | error` に畳み込む。
///
/// ここでは再試行しない。失敗はオフラインキュー経由で再送される。
#[derive(Clone)]
pub struct RemoteCommitter {
    store: Arc<dyn RemoteAttendanceStore>,
    analytics: Arc<AnalyticsLog>,
    timeout: Duration,
}

impl RemoteCommitter {
    pub fn new(
        store: Arc<dyn RemoteAttendanceStore>,
        analytics: Arc<AnalyticsLog>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            analytics,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteAttendanceStore> {
        &self.store
    }

    pub async fn commit(&self, record: &AttendanceRecord) -> CommitOutcome {
        let result = tokio::time::timeout(self.timeout, self.store.commit(record)).await;
        let outcome = match result {
            Ok(Ok(decision)) => CommitOutcome::from(decision),
            Ok(Err(err)) => CommitOutcome::Error(err.to_string()),
            Err(_) => CommitOutcome::Error(format!(
                "remote commit timed out after {}ms",
                self.timeout.as_millis()
            )),
        };

        match &outcome {
            CommitOutcome::Saved => {
                tracing::debug!(
                    target: "attendance::remote",
                    bucket = %record.bucket_key(),
                    timestamp = record.timestamp,
                    "remote commit saved"
                );
            }
            CommitOutcome::RejectedOutdated => {
                tracing::debug!(
                    target: "attendance::remote",
                    bucket = %record.bucket_key(),
                    timestamp = record.timestamp,
                    "remote holds newer state; commit rejected"
                );
                self.track(
                    EVENT_SERVER_REJECTED,
                    json!({
                        "studentId": record.student_id.as_str(),
                        "timestamp": record.timestamp,
                    }),
                );
            }
            CommitOutcome::Error(message) => {
                tracing::warn!(
                    target: "attendance::remote",
                    bucket = %record.bucket_key(),
                    error = %message,
                    "remote commit failed"
                );
                self.track(
                    EVENT_SERVER_ERROR,
                    json!({
                        "studentId": record.student_id.as_str(),
                        "error": message,
                    }),
                );
            }
        }

        outcome
    }

    fn track(&self, name: &str, payload: serde_json::Value) {
        if let Err(err) = self.analytics.track(name, payload) {
            tracing::warn!(target: "attendance::storage", error = %err, "analytics write failed");
        }
    }
}
