use crate::shared::error::AppError;

/// キー単位で JSON 文字列を丸ごと読み書きする同期ストレージ。
///
/// 書き込み失敗時に既存の値を壊してはならない。容量不足は
/// `StorageError::QuotaExceeded` として区別できる形で返す。
pub trait BlobStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}
