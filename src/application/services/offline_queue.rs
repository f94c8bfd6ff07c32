use super::local_store::{Collection, LocalNamespace};
use crate::domain::entities::{AttendanceRecord, CommitOutcome, FlushReport};
use crate::domain::value_objects::{BucketKey, RecordId};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Appended,
    /// 同じ生徒・同じバケットの古いエントリを置き換えた
    Replaced,
    /// 既存エントリの方が新しいため破棄した
    Superseded,
}

/// 1 回のフラッシュの結果。`resolved` はローカルログの synced 更新に使う。
#[derive(Debug, Clone, Default)]
pub struct QueueFlush {
    pub report: FlushReport,
    pub resolved: Vec<(BucketKey, i64)>,
}

/// リモートに届かなかったレコードのバッファ。生徒 × 1 分バケットで集約する。
pub struct OfflineQueue {
    namespace: LocalNamespace,
    gate: Mutex<()>,
    flush_gate: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    pub fn new(namespace: LocalNamespace) -> Self {
        Self {
            namespace,
            gate: Mutex::new(()),
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))
    }

    fn load(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        self.namespace.load(Collection::OfflineQueue)
    }

    fn store(&self, entries: &[AttendanceRecord]) -> Result<(), AppError> {
        self.namespace.save(Collection::OfflineQueue, &entries)
    }

    pub fn enqueue(&self, record: AttendanceRecord) -> Result<EnqueueOutcome, AppError> {
        let record = record.with_synced(false);
        let key = record.bucket_key();

        let _guard = self.lock()?;
        let mut entries = self.load()?;
        let outcome = match entries.iter().position(|entry| entry.bucket_key() == key) {
            Some(idx) if record.timestamp > entries[idx].timestamp => {
                entries[idx] = record;
                EnqueueOutcome::Replaced
            }
            Some(_) => EnqueueOutcome::Superseded,
            None => {
                entries.push(record);
                EnqueueOutcome::Appended
            }
        };

        if outcome != EnqueueOutcome::Superseded {
            self.store(&entries)?;
        }
        tracing::debug!(
            target: "attendance::queue",
            bucket = %key,
            outcome = ?outcome,
            pending = entries.len(),
            "offline queue updated"
        );
        Ok(outcome)
    }

    /// キュー全体のスナップショット
    pub fn snapshot(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        let _guard = self.lock()?;
        self.load()
    }

    pub fn replace(&self, entries: Vec<AttendanceRecord>) -> Result<(), AppError> {
        let _guard = self.lock()?;
        if entries.is_empty() {
            return self.namespace.remove(Collection::OfflineQueue);
        }
        self.store(&entries)
    }

    pub fn len(&self) -> Result<usize, AppError> {
        Ok(self.snapshot()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len()? == 0)
    }

    pub fn is_flushing(&self) -> bool {
        self.flush_gate.try_lock().is_err()
    }

    /// 挿入順にコミットを試み、解決したエントリだけを取り除く。
    ///
    /// 別のフラッシュが進行中なら何もせず `skipped` を返す。フラッシュ中に追加された
    /// エントリは取り除かれない。
    pub async fn flush<F, Fut>(&self, mut commit: F) -> Result<QueueFlush, AppError>
    where
        F: FnMut(AttendanceRecord) -> Fut,
        Fut: Future<Output = CommitOutcome>,
    {
        let Ok(_flushing) = self.flush_gate.try_lock() else {
            tracing::debug!(target: "attendance::queue", "flush already in flight; skipping");
            return Ok(QueueFlush {
                report: FlushReport::skipped(),
                resolved: Vec::new(),
            });
        };

        let pending = self.snapshot()?;
        let mut result = QueueFlush::default();

        for entry in pending {
            let key = entry.bucket_key();
            let timestamp = entry.timestamp;
            let id = entry.id.clone();

            let outcome = commit(entry).await;
            if outcome.is_resolved() {
                self.remove_entry(&id, timestamp)?;
                result.report.sent += 1;
                result.resolved.push((key, timestamp));
            } else {
                tracing::warn!(
                    target: "attendance::queue",
                    bucket = %key,
                    outcome = %outcome,
                    "queued record kept for a later flush"
                );
                result.report.failed += 1;
            }
        }

        result.report.remaining = self.len()? as u32;
        tracing::info!(
            target: "attendance::queue",
            sent = result.report.sent,
            failed = result.report.failed,
            remaining = result.report.remaining,
            "offline queue flushed"
        );
        Ok(result)
    }

    fn remove_entry(&self, id: &RecordId, timestamp: i64) -> Result<(), AppError> {
        let _guard = self.lock()?;
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|entry| !(entry.id == *id && entry.timestamp == timestamp));
        if entries.len() != before {
            self.store(&entries)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AppError> {
        let _guard = self.lock()?;
        self.namespace.remove(Collection::OfflineQueue)
    }
}
