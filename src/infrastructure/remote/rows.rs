use crate::domain::entities::{AttendanceRecord, LatestStatus};
use crate::domain::value_objects::{
    AttendanceType, GeoPoint, RecordId, StudentId, TimeBucket,
};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct BucketRow {
    pub student_id: String,
    pub bucket_ms: i64,
    pub event_id: String,
    pub record_type: String,
    pub timestamp: i64,
    pub synced: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl BucketRow {
    /// 想定外の形の行は欠損として扱う
    pub fn into_record(self) -> Option<AttendanceRecord> {
        let attendance_type = AttendanceType::parse(&self.record_type)?;
        let student_id = StudentId::new(self.student_id).ok()?;
        let id = RecordId::new(self.event_id).ok()?;
        if TimeBucket::containing(self.timestamp).start_ms() != self.bucket_ms {
            return None;
        }

        let record = AttendanceRecord::new(
            id,
            student_id,
            self.timestamp,
            attendance_type,
            GeoPoint::from_parts(self.latitude, self.longitude),
        );
        Some(record.with_synced(self.synced))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LatestRow {
    pub student_id: String,
    pub last_type: String,
    pub last_event_id: String,
    pub bucket_ms: i64,
    pub record_timestamp: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LatestRow {
    pub fn into_status(self) -> Option<LatestStatus> {
        Some(LatestStatus {
            student_id: StudentId::new(self.student_id).ok()?,
            last_type: AttendanceType::parse(&self.last_type)?,
            timestamp: self.record_timestamp,
            last_event_id: RecordId::new(self.last_event_id).ok()?,
            bucket: TimeBucket::from_start_ms(self.bucket_ms),
            location: GeoPoint::from_parts(self.latitude, self.longitude),
        })
    }
}
