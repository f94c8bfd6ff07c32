#![allow(dead_code)]

use async_trait::async_trait;
use safepath_lib::application::ports::notification_sink::NotificationSink;
use safepath_lib::application::ports::remote_store::{
    LatestStatusSubscription, RemoteAttendanceStore,
};
use safepath_lib::application::services::{AttendanceService, ConnectivityMonitor, LocalNamespace};
use safepath_lib::domain::entities::{
    AttendanceNotification, AttendanceRecord, CommitDecision, LatestStatus,
};
use safepath_lib::domain::value_objects::{AttendanceType, RecordId, StudentId};
use safepath_lib::infrastructure::database::ConnectionPool;
use safepath_lib::infrastructure::remote::SqliteRemoteStore;
use safepath_lib::infrastructure::storage::MemoryBlobStorage;
use safepath_lib::shared::config::AppConfig;
use safepath_lib::shared::error::AppError;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STUDENT: &str = "student-001";

pub fn student() -> StudentId {
    StudentId::new(STUDENT.to_string()).expect("student id")
}

pub fn record(id: &str, timestamp: i64, attendance_type: AttendanceType) -> AttendanceRecord {
    AttendanceRecord::new(
        RecordId::new(id.to_string()).expect("record id"),
        student(),
        timestamp,
        attendance_type,
        None,
    )
}

pub async fn setup_remote_store() -> Arc<SqliteRemoteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Arc::new(SqliteRemoteStore::new(ConnectionPool::from_sqlite_pool(pool), 5))
}

/// 実ストアの前段で通信断・ハングを再現するダブル
pub struct FlakyRemoteStore {
    inner: Arc<SqliteRemoteStore>,
    failing: AtomicBool,
    hanging: AtomicBool,
    commits: AtomicUsize,
}

impl FlakyRemoteStore {
    pub fn new(inner: Arc<SqliteRemoteStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<SqliteRemoteStore> {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteAttendanceStore for FlakyRemoteStore {
    async fn commit(&self, record: &AttendanceRecord) -> Result<CommitDecision, AppError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Network("remote unreachable".to_string()));
        }
        self.inner.commit(record).await
    }

    async fn fetch_history(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Network("remote unreachable".to_string()));
        }
        self.inner.fetch_history(student_id, limit).await
    }

    async fn latest_status(&self, student_id: &StudentId) -> Result<Option<LatestStatus>, AppError> {
        self.inner.latest_status(student_id).await
    }

    async fn subscribe_latest(
        &self,
        student_id: &StudentId,
    ) -> Result<LatestStatusSubscription, AppError> {
        self.inner.subscribe_latest(student_id).await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    items: Mutex<Vec<AttendanceNotification>>,
}

impl RecordingSink {
    pub fn items(&self) -> Vec<AttendanceNotification> {
        self.items.lock().expect("sink lock").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.items().into_iter().map(|item| item.message).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn record(&self, notification: AttendanceNotification) -> Result<(), AppError> {
        self.items.lock().expect("sink lock").push(notification);
        Ok(())
    }
}

pub struct ServiceContext {
    pub service: Arc<AttendanceService>,
    pub remote: Arc<FlakyRemoteStore>,
    pub sink: Arc<RecordingSink>,
    pub storage: Arc<MemoryBlobStorage>,
    pub connectivity: ConnectivityMonitor,
}

pub async fn setup_service(online: bool) -> ServiceContext {
    setup_service_with(online, AppConfig::default()).await
}

pub async fn setup_service_with(online: bool, config: AppConfig) -> ServiceContext {
    setup_service_on(online, config, Arc::new(MemoryBlobStorage::new())).await
}

pub async fn setup_service_on(
    online: bool,
    config: AppConfig,
    storage: Arc<MemoryBlobStorage>,
) -> ServiceContext {
    let remote = Arc::new(FlakyRemoteStore::new(setup_remote_store().await));
    let sink = Arc::new(RecordingSink::default());
    let connectivity = ConnectivityMonitor::new(online);
    let namespace = LocalNamespace::new(storage.clone(), config.storage.key_prefix.clone());

    let service = Arc::new(AttendanceService::new(
        namespace,
        remote.clone(),
        sink.clone(),
        connectivity.clone(),
        &config,
    ));

    ServiceContext {
        service,
        remote,
        sink,
        storage,
        connectivity,
    }
}
