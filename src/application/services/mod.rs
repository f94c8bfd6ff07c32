pub mod analytics_log;
pub mod attendance_log;
pub mod attendance_service;
pub mod connectivity;
pub mod live_status;
pub mod local_store;
pub mod offline_queue;
pub mod profile_cache;
pub mod remote_commit;
pub mod sync_metrics;

pub use analytics_log::AnalyticsLog;
pub use attendance_log::AttendanceLog;
pub use attendance_service::{
    AttendanceEvent, AttendanceService, AttendanceServiceTrait, ProducedAttendance, QueueStatus,
};
pub use connectivity::ConnectivityMonitor;
pub use live_status::DistinctLatestStatus;
pub use local_store::{Collection, LocalNamespace};
pub use offline_queue::{EnqueueOutcome, OfflineQueue};
pub use profile_cache::ProfileCache;
pub use remote_commit::RemoteCommitter;
pub use sync_metrics::{SyncMetrics, SyncMetricsSnapshot};
