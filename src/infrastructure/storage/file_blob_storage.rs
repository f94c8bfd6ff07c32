use super::StorageError;
use crate::application::ports::blob_storage::BlobStorage;
use crate::shared::error::AppError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

const BLOB_EXTENSION: &str = "json";

/// キーごとに 1 ファイルへ JSON 文字列を保存するブロブストア。
/// 書き込みは一時ファイル経由の rename で行い、途中失敗で既存データを壊さない。
pub struct FileBlobStorage {
    root: PathBuf,
    quota_bytes: Option<u64>,
    write_lock: Mutex<()>,
}

impl FileBlobStorage {
    pub fn open(root: impl Into<PathBuf>, quota_bytes: Option<u64>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            quota_bytes,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{BLOB_EXTENSION}")))
    }

    fn used_bytes_excluding(&self, target: &Path) -> Result<u64, StorageError> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path == target {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            total = total.saturating_add(entry.metadata()?.len());
        }
        Ok(total)
    }

    fn check_quota(&self, key: &str, path: &Path, needed: u64) -> Result<(), StorageError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let available = quota.saturating_sub(self.used_bytes_excluding(path)?);
        if needed > available {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available,
            });
        }
        Ok(())
    }

    fn write_atomic(&self, key: &str, path: &Path, value: &str) -> Result<(), StorageError> {
        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(value.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|err| map_io(key, value.len() as u64, err))?;
        file.persist(path)
            .map_err(|err| map_io(key, value.len() as u64, err.error))?;
        Ok(())
    }
}

fn map_io(key: &str, needed: u64, err: std::io::Error) -> StorageError {
    if err.kind() == ErrorKind::StorageFull {
        StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            available: 0,
        }
    } else {
        StorageError::Io(err)
    }
}

impl BlobStorage for FileBlobStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        self.check_quota(key, &path, value.len() as u64)?;
        self.write_atomic(key, &path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err).into()),
        }
    }
}
