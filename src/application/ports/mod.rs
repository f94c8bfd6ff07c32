pub mod blob_storage;
pub mod notification_sink;
pub mod remote_store;
