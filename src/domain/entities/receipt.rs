use super::{CommitOutcome, ReconcileOutcome};
use crate::domain::value_objects::AttendanceType;
use serde::{Deserialize, Serialize};

pub const MESSAGE_RECORDED: &str = "Attendance recorded";
pub const MESSAGE_UPDATED: &str = "Attendance updated";
pub const MESSAGE_UP_TO_DATE: &str = "Already up to date";
pub const MESSAGE_SAVED_OFFLINE: &str = "Saved offline (will sync when online)";
pub const MESSAGE_FAILED: &str = "Error recording attendance";
pub const MESSAGE_NOT_STORED_LOCALLY: &str = "Attendance sent, but device storage is full";

/// 1 イベントごとに UI へ返す結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReceipt {
    pub success: bool,
    pub attendance_type: Option<AttendanceType>,
    pub message: String,
    pub local_outcome: Option<ReconcileOutcome>,
    pub remote_outcome: Option<CommitOutcome>,
    pub queued: bool,
}

impl AttendanceReceipt {
    pub fn completed(
        attendance_type: AttendanceType,
        local_outcome: ReconcileOutcome,
        remote_outcome: Option<CommitOutcome>,
        queued: bool,
    ) -> Self {
        let message = match local_outcome {
            ReconcileOutcome::RejectedOutdated => MESSAGE_UP_TO_DATE,
            _ if queued => MESSAGE_SAVED_OFFLINE,
            ReconcileOutcome::Merged => MESSAGE_UPDATED,
            ReconcileOutcome::Saved => MESSAGE_RECORDED,
        };

        Self {
            success: true,
            attendance_type: Some(attendance_type),
            message: message.to_string(),
            local_outcome: Some(local_outcome),
            remote_outcome,
            queued,
        }
    }

    /// 端末ログには残せなかったが、リモートかキューには届いた
    pub fn stored_remotely(
        attendance_type: AttendanceType,
        remote_outcome: Option<CommitOutcome>,
        queued: bool,
    ) -> Self {
        Self {
            success: true,
            attendance_type: Some(attendance_type),
            message: MESSAGE_NOT_STORED_LOCALLY.to_string(),
            local_outcome: None,
            remote_outcome,
            queued,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            attendance_type: None,
            message: MESSAGE_FAILED.to_string(),
            local_outcome: None,
            remote_outcome: None,
            queued: false,
        }
    }
}

/// フラッシュ 1 サイクルの集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub sent: u32,
    pub failed: u32,
    pub remaining: u32,
    /// 別のフラッシュが進行中で今回は何もしなかった
    pub skipped: bool,
}

impl FlushReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn message(&self) -> Option<String> {
        if self.sent > 0 {
            Some(super::notification::synced_records_message(self.sent))
        } else if self.failed > 0 {
            Some("Still offline records pending sync".to_string())
        } else {
            None
        }
    }
}
