pub mod attendance_record;
pub mod latest_status;
pub mod notification;
pub mod outcomes;
pub mod receipt;
pub mod user_profile;

pub use attendance_record::{AttendanceDraft, AttendanceRecord};
pub use latest_status::LatestStatus;
pub use notification::{AttendanceNotification, NotificationKind};
pub use outcomes::{CommitDecision, CommitOutcome, ReconcileOutcome};
pub use receipt::{AttendanceReceipt, FlushReport};
pub use user_profile::{UserProfile, UserRole};
