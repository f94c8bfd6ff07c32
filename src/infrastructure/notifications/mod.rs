pub mod stored_sink;

pub use stored_sink::StoredNotificationSink;
