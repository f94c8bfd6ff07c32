pub mod live_status_hub;
mod queries;
pub mod rows;
pub mod sqlite_remote_store;

pub use live_status_hub::LiveStatusHub;
pub use sqlite_remote_store::SqliteRemoteStore;
