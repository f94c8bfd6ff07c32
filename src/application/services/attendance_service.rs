use super::analytics_log::{
    AnalyticsLog, EVENT_DEDUP_MERGE, EVENT_DEDUP_OUTDATED, EVENT_GATE_SCAN, EVENT_QUEUE_FLUSH,
};
use super::attendance_log::AttendanceLog;
use super::connectivity::ConnectivityMonitor;
use super::live_status::DistinctLatestStatus;
use super::local_store::LocalNamespace;
use super::offline_queue::OfflineQueue;
use super::profile_cache::ProfileCache;
use super::remote_commit::RemoteCommitter;
use super::sync_metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::application::ports::notification_sink::NotificationSink;
use crate::application::ports::remote_store::{LatestStatusSubscription, RemoteAttendanceStore};
use crate::domain::entities::{
    AttendanceDraft, AttendanceNotification, AttendanceReceipt, AttendanceRecord, CommitOutcome,
    FlushReport, LatestStatus, ReconcileOutcome,
};
use crate::domain::value_objects::{GeoPoint, StudentId};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const DEFAULT_GATE: &str = "main";

/// UI 側へ流す型付きイベント
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceEvent {
    Recorded {
        record: AttendanceRecord,
        outcome: ReconcileOutcome,
    },
    Flushed(FlushReport),
}

#[derive(Debug, Clone)]
pub struct ProducedAttendance {
    pub record: AttendanceRecord,
    pub receipt: AttendanceReceipt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: usize,
    pub flushing: bool,
    pub online: bool,
    pub metrics: SyncMetricsSnapshot,
}

#[async_trait]
pub trait AttendanceServiceTrait: Send + Sync {
    async fn produce(&self, draft: AttendanceDraft) -> Result<ProducedAttendance, AppError>;
    async fn record_gate_crossing(
        &self,
        student_id: &StudentId,
        gate: &str,
        timestamp: i64,
        location: Option<GeoPoint>,
    ) -> AttendanceReceipt;
    async fn flush_now(&self) -> Result<FlushReport, AppError>;
    async fn handle_connectivity(&self, online: bool) -> Result<Option<FlushReport>, AppError>;
    async fn refresh_history(&self, student_id: &StudentId) -> Result<usize, AppError>;
    fn history_for(&self, student_id: &StudentId) -> Result<Vec<AttendanceRecord>, AppError>;
    fn queue_status(&self) -> Result<QueueStatus, AppError>;
}

/// 出欠イベントの取り込みからリモート反映、オフライン再送までを束ねる。
pub struct AttendanceService {
    namespace: LocalNamespace,
    log: Arc<AttendanceLog>,
    queue: Arc<OfflineQueue>,
    committer: RemoteCommitter,
    notifications: Arc<dyn NotificationSink>,
    profiles: Arc<ProfileCache>,
    analytics: Arc<AnalyticsLog>,
    connectivity: ConnectivityMonitor,
    metrics: SyncMetrics,
    events: broadcast::Sender<AttendanceEvent>,
    merge_window_ms: i64,
    history_limit: u32,
    remote_timeout: Duration,
    flush_interval: Option<Duration>,
}

impl AttendanceService {
    pub fn new(
        namespace: LocalNamespace,
        remote: Arc<dyn RemoteAttendanceStore>,
        notifications: Arc<dyn NotificationSink>,
        connectivity: ConnectivityMonitor,
        config: &AppConfig,
    ) -> Self {
        let analytics = Arc::new(AnalyticsLog::new(
            namespace.clone(),
            config.analytics.max_events,
        ));
        let remote_timeout = Duration::from_millis(config.remote.commit_timeout_ms);
        let (events, _) = broadcast::channel(config.sync.event_channel_capacity.max(1));
        let flush_interval = match config.sync.flush_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            log: Arc::new(AttendanceLog::new(namespace.clone())),
            queue: Arc::new(OfflineQueue::new(namespace.clone())),
            committer: RemoteCommitter::new(remote, Arc::clone(&analytics), remote_timeout),
            profiles: Arc::new(ProfileCache::new(namespace.clone())),
            namespace,
            notifications,
            analytics,
            connectivity,
            metrics: SyncMetrics::new(),
            events,
            merge_window_ms: config.sync.merge_window_ms,
            history_limit: config.remote.history_limit,
            remote_timeout,
            flush_interval,
        }
    }

    pub fn log(&self) -> &Arc<AttendanceLog> {
        &self.log
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn profiles(&self) -> &Arc<ProfileCache> {
        &self.profiles
    }

    pub fn analytics(&self) -> &Arc<AnalyticsLog> {
        &self.analytics
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AttendanceEvent> {
        self.events.subscribe()
    }

    /// 状態だけを切り替える。再接続時のフラッシュは監視タスクか `handle_connectivity` が行う。
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    pub async fn latest_status(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<LatestStatus>, AppError> {
        tokio::time::timeout(
            self.remote_timeout,
            self.committer.store().latest_status(student_id),
        )
        .await?
    }

    pub async fn subscribe_latest(
        &self,
        student_id: &StudentId,
    ) -> Result<LatestStatusSubscription, AppError> {
        self.committer.store().subscribe_latest(student_id).await
    }

    pub async fn subscribe_latest_distinct(
        &self,
        student_id: &StudentId,
    ) -> Result<DistinctLatestStatus, AppError> {
        Ok(DistinctLatestStatus::new(
            self.subscribe_latest(student_id).await?,
        ))
    }

    /// ログアウト時の全消去
    pub fn clear_local_data(&self) -> Result<(), AppError> {
        self.log.clear()?;
        self.queue.clear()?;
        self.namespace.clear_all()?;
        tracing::info!(target: "attendance::storage", "local attendance data cleared");
        Ok(())
    }

    /// 再接続と定期実行でフラッシュを起動する監視タスク
    pub fn spawn_connectivity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut rx = self.connectivity.subscribe();
        let interval = self.flush_interval;

        tokio::spawn(async move {
            let mut was_online = *rx.borrow_and_update();
            let mut ticker = interval.map(|period| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker
            });

            loop {
                let tick = async {
                    match ticker.as_mut() {
                        Some(ticker) => {
                            ticker.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *rx.borrow_and_update();
                        if online && !was_online {
                            service.run_flush("reconnect").await;
                        }
                        was_online = online;
                    }
                    _ = tick => {
                        if service.connectivity.is_online() {
                            service.run_flush("interval").await;
                        }
                    }
                }
            }
        })
    }

    async fn run_flush(&self, trigger: &str) {
        if let Err(err) = self.flush_with_trigger(trigger).await {
            tracing::error!(
                target: "attendance::sync",
                trigger,
                error = %err,
                "offline flush failed"
            );
        }
    }

    async fn flush_with_trigger(&self, trigger: &str) -> Result<FlushReport, AppError> {
        if self.queue.is_empty()? {
            return Ok(FlushReport::default());
        }

        let started = Instant::now();
        let committer = self.committer.clone();
        let flushed = self
            .queue
            .flush(move |record| {
                let committer = committer.clone();
                async move { committer.commit(&record).await }
            })
            .await?;

        let report = flushed.report;
        if report.skipped {
            return Ok(report);
        }

        self.log.mark_synced(&flushed.resolved)?;
        self.metrics.record_flush(
            trigger,
            report.sent,
            report.failed,
            started.elapsed().as_millis() as u64,
        );
        self.track(
            EVENT_QUEUE_FLUSH,
            json!({ "sent": report.sent, "failed": report.failed, "trigger": trigger }),
        );

        if report.sent > 0 {
            let notification =
                AttendanceNotification::for_flush(report.sent, Utc::now().timestamp_millis());
            self.notify(notification);
        }
        if report.sent > 0 || report.failed > 0 {
            let _ = self.events.send(AttendanceEvent::Flushed(report.clone()));
        }

        Ok(report)
    }

    fn notify(&self, notification: AttendanceNotification) {
        if let Err(err) = self.notifications.record(notification) {
            tracing::warn!(
                target: "attendance::sync",
                error = %err,
                "notification sink rejected notification"
            );
        }
    }

    fn track(&self, name: &str, payload: serde_json::Value) {
        if let Err(err) = self.analytics.track(name, payload) {
            tracing::warn!(target: "attendance::storage", error = %err, "analytics write failed");
        }
    }

    fn announce(&self, record: &AttendanceRecord, outcome: ReconcileOutcome, gate: &str) {
        match outcome {
            ReconcileOutcome::RejectedOutdated => {
                self.track(
                    EVENT_DEDUP_OUTDATED,
                    json!({
                        "studentId": record.student_id.as_str(),
                        "timestamp": record.timestamp,
                    }),
                );
                return;
            }
            ReconcileOutcome::Merged => {
                self.track(
                    EVENT_DEDUP_MERGE,
                    json!({
                        "studentId": record.student_id.as_str(),
                        "timestamp": record.timestamp,
                        "type": record.attendance_type.as_str(),
                    }),
                );
            }
            ReconcileOutcome::Saved => {}
        }

        let name = self.profiles.display_name(&record.student_id);
        let mut notification = AttendanceNotification::for_attendance(
            &record.student_id,
            &name,
            record.attendance_type,
            gate,
            record.timestamp,
        );
        if outcome == ReconcileOutcome::Merged {
            notification = notification.superseding();
        }
        self.notify(notification);

        let _ = self.events.send(AttendanceEvent::Recorded {
            record: record.clone(),
            outcome,
        });
    }
}

#[async_trait]
impl AttendanceServiceTrait for AttendanceService {
    /// ローカルの取り込み判定を先に確定させ、その後でリモートへ送る。
    /// ローカル書き込みに失敗してもリモート送信かキュー投入は続ける。
    async fn produce(&self, draft: AttendanceDraft) -> Result<ProducedAttendance, AppError> {
        let gate = draft.gate.clone().unwrap_or_else(|| DEFAULT_GATE.to_string());
        let record = draft.into_record();

        let local = match self.log.reconcile(&record, self.merge_window_ms) {
            Ok(outcome) => {
                self.announce(&record, outcome, &gate);
                Ok(outcome)
            }
            Err(err) => {
                tracing::error!(
                    target: "attendance::log",
                    student_id = %record.student_id,
                    record_id = %record.id,
                    error = %err,
                    "local log write failed"
                );
                Err(err)
            }
        };
        let needs_delivery = local.as_ref().map_or(true, |outcome| outcome.is_write());

        let mut remote = None;
        let mut enqueue = false;
        if self.connectivity.is_online() {
            let outcome = self.committer.commit(&record).await;
            if !outcome.is_resolved() {
                enqueue = true;
            } else if local.is_ok() {
                if let Err(err) = self
                    .log
                    .mark_synced(&[(record.bucket_key(), record.timestamp)])
                {
                    tracing::warn!(
                        target: "attendance::log",
                        record_id = %record.id,
                        error = %err,
                        "could not mark record as synced"
                    );
                }
            }
            remote = Some(outcome);
        } else if needs_delivery {
            enqueue = true;
        }

        let queued = if enqueue {
            if let Err(err) = self.queue.enqueue(record.clone()) {
                tracing::error!(
                    target: "attendance::queue",
                    record_id = %record.id,
                    error = %err,
                    "offline queue write failed"
                );
                return Err(local.err().unwrap_or(err));
            }
            true
        } else {
            false
        };

        tracing::info!(
            target: "attendance::sync",
            student_id = %record.student_id,
            record_id = %record.id,
            local = local.as_ref().map_or("failed", |outcome| outcome.as_str()),
            remote = remote.as_ref().map(CommitOutcome::as_str),
            queued,
            "attendance event processed"
        );

        let receipt = match local {
            Ok(local) => {
                AttendanceReceipt::completed(record.attendance_type, local, remote, queued)
            }
            // ここまで来ていればリモートかキューのどちらかには届いている
            Err(_) => AttendanceReceipt::stored_remotely(record.attendance_type, remote, queued),
        };
        Ok(ProducedAttendance { record, receipt })
    }

    async fn record_gate_crossing(
        &self,
        student_id: &StudentId,
        gate: &str,
        timestamp: i64,
        location: Option<GeoPoint>,
    ) -> AttendanceReceipt {
        let attendance_type = match self.log.next_type_for(student_id) {
            Ok(attendance_type) => attendance_type,
            Err(err) => {
                tracing::error!(
                    target: "attendance::log",
                    student_id = %student_id,
                    error = %err,
                    "could not read local head"
                );
                return AttendanceReceipt::failed();
            }
        };

        self.track(
            EVENT_GATE_SCAN,
            json!({ "studentId": student_id.as_str(), "gate": gate }),
        );

        let mut draft = AttendanceDraft::new(student_id.clone(), attendance_type, timestamp)
            .with_gate(gate);
        draft.location = location;

        match self.produce(draft).await {
            Ok(produced) => produced.receipt,
            Err(err) => {
                tracing::error!(
                    target: "attendance::sync",
                    student_id = %student_id,
                    error = %err,
                    "attendance event could not be recorded"
                );
                AttendanceReceipt::failed()
            }
        }
    }

    async fn flush_now(&self) -> Result<FlushReport, AppError> {
        self.flush_with_trigger("manual").await
    }

    async fn handle_connectivity(&self, online: bool) -> Result<Option<FlushReport>, AppError> {
        if self.connectivity.set_online(online) {
            return self.flush_with_trigger("reconnect").await.map(Some);
        }
        Ok(None)
    }

    async fn refresh_history(&self, student_id: &StudentId) -> Result<usize, AppError> {
        let records = tokio::time::timeout(
            self.remote_timeout,
            self.committer
                .store()
                .fetch_history(student_id, self.history_limit),
        )
        .await??;

        let count = self.log.upsert_many(records)?;
        tracing::debug!(
            target: "attendance::sync",
            student_id = %student_id,
            count,
            "history refreshed from remote"
        );
        Ok(count)
    }

    fn history_for(&self, student_id: &StudentId) -> Result<Vec<AttendanceRecord>, AppError> {
        self.log.read_for(student_id)
    }

    fn queue_status(&self) -> Result<QueueStatus, AppError> {
        Ok(QueueStatus {
            pending: self.queue.len()?,
            flushing: self.queue.is_flushing(),
            online: self.connectivity.is_online(),
            metrics: self.metrics.snapshot(),
        })
    }
}
