use crate::domain::value_objects::{AttendanceType, GeoPoint, RecordId, StudentId, TimeBucket};
use serde::{Deserialize, Serialize};

/// `attendance_latest` の非正規化プロジェクション。ライブ購読者向け。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestStatus {
    pub student_id: StudentId,
    pub last_type: AttendanceType,
    pub timestamp: i64,
    pub last_event_id: RecordId,
    pub bucket: TimeBucket,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}
