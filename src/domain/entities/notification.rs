use crate::domain::value_objects::{AttendanceType, RecordId, StudentId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Info,
    Attendance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceNotification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    /// マージ時は同じ生徒・同じタイトルの既存通知を置き換える
    #[serde(skip)]
    pub supersedes_previous: bool,
}

impl AttendanceNotification {
    pub fn for_attendance(
        student_id: &StudentId,
        display_name: &str,
        attendance_type: AttendanceType,
        gate: &str,
        timestamp: i64,
    ) -> Self {
        Self {
            id: RecordId::generate().to_string(),
            title: format!("Attendance: {}", attendance_type),
            message: format!(
                "{} has {} school via {} gate.",
                display_name,
                attendance_type.verb_phrase(),
                gate
            ),
            timestamp,
            kind: NotificationKind::Attendance,
            read: false,
            student_id: Some(student_id.clone()),
            supersedes_previous: false,
        }
    }

    pub fn superseding(mut self) -> Self {
        self.supersedes_previous = true;
        self
    }

    pub fn for_flush(sent: u32, timestamp: i64) -> Self {
        Self {
            id: RecordId::generate().to_string(),
            title: "Offline sync".to_string(),
            message: synced_records_message(sent),
            timestamp,
            kind: NotificationKind::Info,
            read: false,
            student_id: None,
            supersedes_previous: false,
        }
    }
}

pub fn synced_records_message(sent: u32) -> String {
    format!(
        "Synced {} offline record{}",
        sent,
        if sent == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_wording_follows_direction() {
        let student = StudentId::new("s1".into()).unwrap();
        let login =
            AttendanceNotification::for_attendance(&student, "Ana", AttendanceType::Login, "main", 1);
        assert_eq!(login.title, "Attendance: LOGIN");
        assert_eq!(login.message, "Ana has arrived at school via main gate.");

        let logout =
            AttendanceNotification::for_attendance(&student, "Ana", AttendanceType::Logout, "east", 2);
        assert_eq!(logout.message, "Ana has left school via east gate.");
    }

    #[test]
    fn flush_message_pluralizes() {
        assert_eq!(synced_records_message(1), "Synced 1 offline record");
        assert_eq!(synced_records_message(3), "Synced 3 offline records");
    }
}
