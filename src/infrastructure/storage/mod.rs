pub mod error;
pub mod file_blob_storage;
pub mod memory_blob_storage;

pub use error::StorageError;
pub use file_blob_storage::FileBlobStorage;
pub use memory_blob_storage::MemoryBlobStorage;
