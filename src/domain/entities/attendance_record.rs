use crate::domain::value_objects::{
    AttendanceType, BucketKey, GeoPoint, RecordId, StudentId, TimeBucket,
};
use serde::{Deserialize, Serialize};

/// 出欠イベントの最小単位。`timestamp` はプロデューサーが付与する論理時計（Unix ミリ秒）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub student_id: StudentId,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub attendance_type: AttendanceType,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl AttendanceRecord {
    pub fn new(
        id: RecordId,
        student_id: StudentId,
        timestamp: i64,
        attendance_type: AttendanceType,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            id,
            student_id,
            timestamp,
            attendance_type,
            synced: false,
            location,
        }
    }

    pub fn with_synced(mut self, synced: bool) -> Self {
        self.synced = synced;
        self
    }

    pub fn bucket(&self) -> TimeBucket {
        TimeBucket::containing(self.timestamp)
    }

    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.student_id.clone(), self.bucket())
    }
}

/// プロデューサー（QR スキャン / NFC タップ / 手入力）から渡される未確定イベント
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceDraft {
    pub student_id: StudentId,
    pub attendance_type: AttendanceType,
    pub timestamp: i64,
    pub location: Option<GeoPoint>,
    pub gate: Option<String>,
}

impl AttendanceDraft {
    pub fn new(student_id: StudentId, attendance_type: AttendanceType, timestamp: i64) -> Self {
        Self {
            student_id,
            attendance_type,
            timestamp,
            location: None,
            gate: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_gate(mut self, gate: impl Into<String>) -> Self {
        self.gate = Some(gate.into());
        self
    }

    pub fn into_record(self) -> AttendanceRecord {
        AttendanceRecord::new(
            RecordId::generate(),
            self.student_id,
            self.timestamp,
            self.attendance_type,
            self.location,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let record = AttendanceRecord::new(
            RecordId::new("a".into()).unwrap(),
            StudentId::new("s1".into()).unwrap(),
            1_000,
            AttendanceType::Login,
            Some(GeoPoint::new(14.5995, 120.9842)),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "a");
        assert_eq!(value["studentId"], "s1");
        assert_eq!(value["type"], "LOGIN");
        assert_eq!(value["synced"], false);
        assert_eq!(value["location"]["lat"], 14.5995);
    }

    #[test]
    fn missing_location_is_omitted() {
        let record = AttendanceRecord::new(
            RecordId::new("a".into()).unwrap(),
            StudentId::new("s1".into()).unwrap(),
            1_000,
            AttendanceType::Logout,
            None,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("location"));
    }

    #[test]
    fn draft_assigns_fresh_ids() {
        let draft = AttendanceDraft::new(
            StudentId::new("s1".into()).unwrap(),
            AttendanceType::Login,
            5_000,
        );
        let a = draft.clone().into_record();
        let b = draft.into_record();
        assert_ne!(a.id, b.id);
        assert!(!a.synced);
    }
}
