use super::live_status_hub::LiveStatusHub;
use super::queries::{
    SELECT_BUCKET, SELECT_BUCKET_TIMESTAMP, SELECT_HISTORY, SELECT_LATEST, UPSERT_BUCKET,
    UPSERT_LATEST,
};
use super::rows::{BucketRow, LatestRow};
use crate::application::ports::remote_store::{LatestStatusSubscription, RemoteAttendanceStore};
use crate::domain::entities::{AttendanceRecord, CommitDecision, LatestStatus};
use crate::domain::value_objects::{BucketKey, StudentId};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const CONTENTION_BACKOFF_MS: u64 = 10;
pub const DEFAULT_LIVE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 最新ステータスの読み出しと配信。購読ごとのポーリングタスクとも共有する。
struct LatestFeed {
    pool: ConnectionPool,
    hub: LiveStatusHub,
    publish_gate: Mutex<()>,
}

impl LatestFeed {
    async fn load(&self, student_id: &StudentId) -> Result<Option<LatestStatus>, AppError> {
        let row = sqlx::query_as::<_, LatestRow>(SELECT_LATEST)
            .bind(student_id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        Ok(row.and_then(|row| {
            let status = row.into_status();
            if status.is_none() {
                tracing::warn!(
                    target: "attendance::remote",
                    student_id = %student_id,
                    "malformed latest status row ignored"
                );
            }
            status
        }))
    }

    /// DB の現在値を読み直して配信する。ゲートで直列化するので最後の配信は最新状態になる。
    async fn publish(&self, student_id: &StudentId) {
        let _guard = self.publish_gate.lock().await;
        match self.load(student_id).await {
            Ok(status) => self.hub.publish(student_id, status),
            Err(err) => tracing::warn!(
                target: "attendance::remote",
                student_id = %student_id,
                error = %err,
                "failed to reload latest status for subscribers"
            ),
        }
    }

    /// 他の書き込み元のコミットも拾えるよう、購読者がいる間だけ定期的に読み直す
    fn spawn_poller(self: Arc<Self>, student_id: StudentId, period: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if self.hub.retire_if_idle(&student_id) {
                    break;
                }
                self.publish(&student_id).await;
            }
            tracing::debug!(
                target: "attendance::remote",
                student_id = %student_id,
                "live status poller stopped"
            );
        });
    }
}

/// SQLite 上の共有出欠ストア。
///
/// バケット行と最新ステータス行は同一トランザクションで更新する。ロック競合
/// (SQLITE_BUSY / SQLITE_LOCKED) のときだけトランザクション全体をやり直す。
pub struct SqliteRemoteStore {
    pool: ConnectionPool,
    feed: Arc<LatestFeed>,
    max_attempts: u32,
    poll_interval: Duration,
}

impl SqliteRemoteStore {
    pub fn new(pool: ConnectionPool, max_attempts: u32) -> Self {
        Self {
            feed: Arc::new(LatestFeed {
                pool: pool.clone(),
                hub: LiveStatusHub::new(),
                publish_gate: Mutex::new(()),
            }),
            pool,
            max_attempts: max_attempts.max(1),
            poll_interval: DEFAULT_LIVE_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub async fn initialize(&self) -> Result<(), AppError> {
        self.pool.migrate().await?;
        Ok(())
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    async fn try_commit(&self, record: &AttendanceRecord) -> Result<CommitDecision, AppError> {
        let bucket_ms = record.bucket().start_ms();
        let location = record.location;
        let now = Utc::now().timestamp_millis();

        let mut tx = self.pool.get_pool().begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(SELECT_BUCKET_TIMESTAMP)
            .bind(record.student_id.as_str())
            .bind(bucket_ms)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(stored) = existing {
            if stored > record.timestamp {
                tx.rollback().await?;
                return Ok(CommitDecision::RejectedOutdated);
            }
        }

        sqlx::query(UPSERT_BUCKET)
            .bind(record.student_id.as_str())
            .bind(bucket_ms)
            .bind(record.id.as_str())
            .bind(record.attendance_type.as_str())
            .bind(record.timestamp)
            .bind(location.map(|point| point.lat))
            .bind(location.map(|point| point.lng))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(UPSERT_LATEST)
            .bind(record.student_id.as_str())
            .bind(record.attendance_type.as_str())
            .bind(record.id.as_str())
            .bind(bucket_ms)
            .bind(record.timestamp)
            .bind(location.map(|point| point.lat))
            .bind(location.map(|point| point.lng))
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(CommitDecision::Saved)
    }

    /// 単一バケットの参照（主にテスト・診断用）
    pub async fn bucket(&self, key: &BucketKey) -> Result<Option<AttendanceRecord>, AppError> {
        let row = sqlx::query_as::<_, BucketRow>(SELECT_BUCKET)
            .bind(key.student_id.as_str())
            .bind(key.bucket.start_ms())
            .fetch_optional(self.pool.get_pool())
            .await?;
        Ok(row.and_then(BucketRow::into_record))
    }
}

#[async_trait]
impl RemoteAttendanceStore for SqliteRemoteStore {
    async fn commit(&self, record: &AttendanceRecord) -> Result<CommitDecision, AppError> {
        let mut attempt = 1;
        let decision = loop {
            match self.try_commit(record).await {
                Ok(decision) => break decision,
                Err(err) if err.is_contention() && attempt < self.max_attempts => {
                    tracing::debug!(
                        target: "attendance::remote",
                        bucket = %record.bucket_key(),
                        attempt,
                        "transaction contention; retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(
                        CONTENTION_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        if decision == CommitDecision::Saved {
            self.feed.publish(&record.student_id).await;
        }
        Ok(decision)
    }

    async fn fetch_history(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let rows = sqlx::query_as::<_, BucketRow>(SELECT_HISTORY)
            .bind(student_id.as_str())
            .bind(i64::from(limit))
            .fetch_all(self.pool.get_pool())
            .await?;

        let total = rows.len();
        let records: Vec<AttendanceRecord> =
            rows.into_iter().filter_map(BucketRow::into_record).collect();
        if records.len() != total {
            tracing::warn!(
                target: "attendance::remote",
                student_id = %student_id,
                skipped = total - records.len(),
                "malformed bucket rows skipped"
            );
        }
        Ok(records)
    }

    async fn latest_status(&self, student_id: &StudentId) -> Result<Option<LatestStatus>, AppError> {
        self.feed.load(student_id).await
    }

    async fn subscribe_latest(
        &self,
        student_id: &StudentId,
    ) -> Result<LatestStatusSubscription, AppError> {
        let (receiver, created) = {
            let _guard = self.feed.publish_gate.lock().await;
            let current = self.feed.load(student_id).await?;
            self.feed.hub.subscribe(student_id, current)
        };
        if created {
            Arc::clone(&self.feed).spawn_poller(student_id.clone(), self.poll_interval);
        }
        Ok(receiver)
    }
}
