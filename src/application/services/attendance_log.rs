use super::local_store::{Collection, LocalNamespace};
use crate::domain::entities::{AttendanceRecord, ReconcileOutcome};
use crate::domain::reconcile::{self, MergeDecision};
use crate::domain::value_objects::{AttendanceType, BucketKey, StudentId};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// 新しい順に並ぶ端末ローカルの出欠ログ。
///
/// ログ自体は全生徒分を 1 つのコレクションで持ち、先頭の判定は `student_id` で絞り込む。
/// 読み書きはすべて同期で、ネットワーク待ちを挟まない。
pub struct AttendanceLog {
    namespace: LocalNamespace,
    gate: Mutex<()>,
}

impl AttendanceLog {
    pub fn new(namespace: LocalNamespace) -> Self {
        Self {
            namespace,
            gate: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))
    }

    fn load(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        self.namespace.load(Collection::Attendance)
    }

    fn store(&self, records: &[AttendanceRecord]) -> Result<(), AppError> {
        self.namespace.save(Collection::Attendance, &records)
    }

    /// 同じ id が既にあれば何もしない。挿入したら true。
    pub fn append(&self, record: AttendanceRecord) -> Result<bool, AppError> {
        let _guard = self.lock()?;
        let mut records = self.load()?;
        if records.iter().any(|existing| existing.id == record.id) {
            return Ok(false);
        }
        records.insert(0, record);
        self.store(&records)?;
        Ok(true)
    }

    pub fn head_for(&self, student_id: &StudentId) -> Result<Option<AttendanceRecord>, AppError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|record| &record.student_id == student_id))
    }

    pub fn read_all(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        self.load()
    }

    pub fn read_for(&self, student_id: &StudentId) -> Result<Vec<AttendanceRecord>, AppError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|record| &record.student_id == student_id)
            .collect())
    }

    /// リモート由来のレコードを id 単位で取り込む。衝突時はリモート優先で、常に synced=true。
    pub fn upsert_many(&self, incoming: Vec<AttendanceRecord>) -> Result<usize, AppError> {
        if incoming.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock()?;
        let mut records = self.load()?;
        let mut positions: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.id.as_str().to_string(), idx))
            .collect();

        let count = incoming.len();
        for record in incoming {
            let record = record.with_synced(true);
            match positions.get(record.id.as_str()) {
                Some(&idx) => records[idx] = record,
                None => {
                    positions.insert(record.id.as_str().to_string(), records.len());
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.store(&records)?;
        Ok(count)
    }

    /// 取り込み判定を行い、結果に応じてログを書き換える。却下時は何も書かない。
    pub fn reconcile(
        &self,
        candidate: &AttendanceRecord,
        merge_window_ms: i64,
    ) -> Result<ReconcileOutcome, AppError> {
        let _guard = self.lock()?;
        let mut records = self.load()?;

        if records.iter().any(|existing| existing.id == candidate.id) {
            tracing::debug!(
                target: "attendance::log",
                record_id = %candidate.id,
                "record already present; treating as outdated replay"
            );
            return Ok(ReconcileOutcome::RejectedOutdated);
        }

        let head_idx = records
            .iter()
            .position(|record| record.student_id == candidate.student_id);
        let head = head_idx.map(|idx| &records[idx]);
        let decision = reconcile::decide(candidate, head, merge_window_ms);

        match (decision, head_idx) {
            (MergeDecision::RejectOutdated, _) => {
                tracing::debug!(
                    target: "attendance::log",
                    student_id = %candidate.student_id,
                    candidate_ts = candidate.timestamp,
                    head_ts = head.map(|h| h.timestamp),
                    "candidate rejected as outdated"
                );
                return Ok(ReconcileOutcome::RejectedOutdated);
            }
            (MergeDecision::Merge, Some(idx)) => {
                reconcile::merge_into(&mut records[idx], candidate);
                tracing::debug!(
                    target: "attendance::log",
                    student_id = %candidate.student_id,
                    head_id = %records[idx].id,
                    timestamp = candidate.timestamp,
                    "candidate merged into head"
                );
            }
            _ => {
                records.insert(0, candidate.clone());
                tracing::debug!(
                    target: "attendance::log",
                    student_id = %candidate.student_id,
                    record_id = %candidate.id,
                    timestamp = candidate.timestamp,
                    "candidate saved as new head"
                );
            }
        }

        self.store(&records)?;
        Ok(decision.outcome())
    }

    /// 解決済みバケットのうち、解決時刻以前のレコードを synced にする。
    pub fn mark_synced(&self, resolved: &[(BucketKey, i64)]) -> Result<usize, AppError> {
        if resolved.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock()?;
        let mut records = self.load()?;
        let limits: HashMap<&BucketKey, i64> = resolved
            .iter()
            .map(|(key, ts)| (key, *ts))
            .fold(HashMap::new(), |mut acc, (key, ts)| {
                let entry = acc.entry(key).or_insert(ts);
                *entry = (*entry).max(ts);
                acc
            });

        let mut changed = 0usize;
        for record in records.iter_mut().filter(|record| !record.synced) {
            let key = record.bucket_key();
            if let Some(limit) = limits.get(&key) {
                if record.timestamp <= *limit {
                    record.synced = true;
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            self.store(&records)?;
        }
        Ok(changed)
    }

    pub fn next_type_for(&self, student_id: &StudentId) -> Result<AttendanceType, AppError> {
        Ok(reconcile::next_attendance_type(
            self.head_for(student_id)?.as_ref(),
        ))
    }

    pub fn clear(&self) -> Result<(), AppError> {
        let _guard = self.lock()?;
        self.namespace.remove(Collection::Attendance)
    }
}
