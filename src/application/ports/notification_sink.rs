use crate::domain::entities::AttendanceNotification;
use crate::shared::error::AppError;

pub trait NotificationSink: Send + Sync {
    fn record(&self, notification: AttendanceNotification) -> Result<(), AppError>;
}
