use crate::application::ports::notification_sink::NotificationSink;
use crate::application::services::local_store::{Collection, LocalNamespace};
use crate::domain::entities::{AttendanceNotification, NotificationKind};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use std::sync::Mutex;

/// ローカル名前空間に新しい順で通知を積む。上限を超えた古い通知は捨てる。
pub struct StoredNotificationSink {
    namespace: LocalNamespace,
    max_notifications: usize,
    gate: Mutex<()>,
}

impl StoredNotificationSink {
    pub fn new(namespace: LocalNamespace, max_notifications: usize) -> Self {
        Self {
            namespace,
            max_notifications,
            gate: Mutex::new(()),
        }
    }

    pub fn list(&self) -> Result<Vec<AttendanceNotification>, AppError> {
        self.namespace.load(Collection::Notifications)
    }

    pub fn unread_count(&self) -> Result<usize, AppError> {
        Ok(self.list()?.iter().filter(|n| !n.read).count())
    }

    pub fn mark_all_read(&self) -> Result<(), AppError> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))?;
        let mut items = self.list()?;
        for item in items.iter_mut() {
            item.read = true;
        }
        self.namespace.save(Collection::Notifications, &items)
    }
}

impl NotificationSink for StoredNotificationSink {
    fn record(&self, notification: AttendanceNotification) -> Result<(), AppError> {
        let _guard = self
            .gate
            .lock()
            .map_err(|_| AppError::Storage(StorageError::LockPoisoned))?;
        let mut items = self.list()?;

        // マージ時は同じ生徒・同じタイトルの通知を書き換えて先頭へ移す
        let existing = notification
            .supersedes_previous
            .then(|| {
                items.iter().position(|item| {
                    item.kind == NotificationKind::Attendance
                        && item.student_id == notification.student_id
                        && item.title == notification.title
                })
            })
            .flatten();

        let entry = match existing {
            Some(idx) => {
                let mut item = items.remove(idx);
                item.timestamp = notification.timestamp;
                item.message = notification.message;
                item
            }
            None => notification,
        };
        items.insert(0, entry);
        items.truncate(self.max_notifications);

        self.namespace.save(Collection::Notifications, &items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{AttendanceType, StudentId};
    use crate::infrastructure::storage::MemoryBlobStorage;
    use std::sync::Arc;

    fn sink(max: usize) -> StoredNotificationSink {
        StoredNotificationSink::new(
            LocalNamespace::new(Arc::new(MemoryBlobStorage::new()), "safepath"),
            max,
        )
    }

    #[test]
    fn newest_first_and_capped() {
        let sink = sink(2);
        for ts in 1..=3 {
            sink.record(AttendanceNotification::for_flush(ts as u32, ts))
                .unwrap();
        }
        let items = sink.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].timestamp, 3);
        assert_eq!(items[1].timestamp, 2);
        assert_eq!(sink.unread_count().unwrap(), 2);
    }

    #[test]
    fn merged_notifications_replace_previous_entry() {
        let sink = sink(10);
        let student = StudentId::new("s1".into()).unwrap();
        sink.record(AttendanceNotification::for_attendance(
            &student,
            "Ana",
            AttendanceType::Login,
            "main",
            1_000,
        ))
        .unwrap();
        sink.record(AttendanceNotification::for_flush(1, 2_000)).unwrap();
        sink.record(
            AttendanceNotification::for_attendance(
                &student,
                "Ana",
                AttendanceType::Login,
                "east",
                30_000,
            )
            .superseding(),
        )
        .unwrap();

        let items = sink.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].timestamp, 30_000);
        assert_eq!(items[0].message, "Ana has arrived at school via east gate.");

        sink.mark_all_read().unwrap();
        assert_eq!(sink.unread_count().unwrap(), 0);
    }
}
