pub mod database;
pub mod notifications;
pub mod remote;
pub mod storage;
