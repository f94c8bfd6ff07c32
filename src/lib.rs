pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::blob_storage::BlobStorage;
pub use application::ports::notification_sink::NotificationSink;
pub use application::ports::remote_store::{LatestStatusSubscription, RemoteAttendanceStore};
pub use application::services::{
    AttendanceEvent, AttendanceService, AttendanceServiceTrait, ConnectivityMonitor,
    DistinctLatestStatus, LocalNamespace, QueueStatus,
};
pub use domain::entities::{
    AttendanceDraft, AttendanceReceipt, AttendanceRecord, CommitOutcome, FlushReport,
    LatestStatus, ReconcileOutcome,
};
pub use domain::value_objects::{AttendanceType, GeoPoint, RecordId, StudentId};
pub use infrastructure::database::ConnectionPool;
pub use infrastructure::notifications::StoredNotificationSink;
pub use infrastructure::remote::SqliteRemoteStore;
pub use infrastructure::storage::{FileBlobStorage, MemoryBlobStorage, StorageError};
pub use shared::{AppConfig, AppError};

/// `attendance::*` ターゲットは debug まで、それ以外は info まで
pub const DEFAULT_LOG_FILTER: &str = "attendance=debug,info";

/// ログ設定の初期化
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn default_filter_enables_attendance_debug() {
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "attendance::sync", Level::DEBUG));
            assert!(tracing::enabled!(target: "attendance::remote", Level::DEBUG));
            assert!(!tracing::enabled!(target: "sqlx::query", Level::DEBUG));
            assert!(tracing::enabled!(target: "sqlx::query", Level::INFO));
        });
    }
}
