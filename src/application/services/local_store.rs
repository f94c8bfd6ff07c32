use crate::application::ports::blob_storage::BlobStorage;
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// 名前空間内のコレクション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Attendance,
    OfflineQueue,
    UserProfiles,
    Notifications,
    Analytics,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Attendance,
        Collection::OfflineQueue,
        Collection::UserProfiles,
        Collection::Notifications,
        Collection::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Attendance => "attendance",
            Collection::OfflineQueue => "offline_queue",
            Collection::UserProfiles => "user_profiles",
            Collection::Notifications => "notifications",
            Collection::Analytics => "analytics",
        }
    }

    /// 容量不足時に消してよい補助データか
    pub fn is_auxiliary(&self) -> bool {
        matches!(self, Collection::Analytics)
    }
}

/// 固定プレフィックス付きでコレクションを JSON ブロブとして読み書きする。
#[derive(Clone)]
pub struct LocalNamespace {
    storage: Arc<dyn BlobStorage>,
    prefix: String,
}

impl LocalNamespace {
    pub fn new(storage: Arc<dyn BlobStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, collection: Collection) -> String {
        format!("{}_{}", self.prefix, collection.as_str())
    }

    /// 未保存なら `T::default()`。壊れた値は上書きせずエラーとして返す。
    pub fn load<T>(&self, collection: Collection) -> Result<T, AppError>
    where
        T: DeserializeOwned + Default,
    {
        let key = self.key(collection);
        match self.storage.get(&key)? {
            None => Ok(T::default()),
            Some(raw) if raw.trim().is_empty() => Ok(T::default()),
            Some(raw) => serde_json::from_str(&raw).map_err(|err| {
                tracing::error!(
                    target: "attendance::storage",
                    key = %key,
                    error = %err,
                    "stored collection could not be decoded"
                );
                AppError::Storage(StorageError::Corrupted {
                    key,
                    reason: err.to_string(),
                })
            }),
        }
    }

    /// 出欠ログ・キューなど必須データの書き込み。容量不足なら補助データを消して 1 回だけ再試行する。
    pub fn save<T: Serialize>(&self, collection: Collection, value: &T) -> Result<(), AppError> {
        let key = self.key(collection);
        let raw = serde_json::to_string(value)?;

        match self.storage.set(&key, &raw) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() && !collection.is_auxiliary() => {
                tracing::warn!(
                    target: "attendance::storage",
                    key = %key,
                    error = %err,
                    "storage quota exceeded; dropping auxiliary data and retrying"
                );
                self.clear_auxiliary()?;
                self.storage.set(&key, &raw).map_err(|retry_err| {
                    tracing::error!(
                        target: "attendance::storage",
                        key = %key,
                        error = %retry_err,
                        "write failed after dropping auxiliary data"
                    );
                    retry_err
                })
            }
            Err(err) => {
                tracing::error!(
                    target: "attendance::storage",
                    key = %key,
                    error = %err,
                    "failed to persist collection"
                );
                Err(err)
            }
        }
    }

    pub fn remove(&self, collection: Collection) -> Result<(), AppError> {
        self.storage.remove(&self.key(collection))
    }

    pub fn clear_auxiliary(&self) -> Result<(), AppError> {
        for collection in Collection::ALL.iter().filter(|c| c.is_auxiliary()) {
            self.remove(*collection)?;
        }
        Ok(())
    }

    pub fn clear_all(&self) -> Result<(), AppError> {
        for collection in Collection::ALL {
            self.remove(collection)?;
        }
        Ok(())
    }
}
