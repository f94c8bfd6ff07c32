use std::fmt;

use crate::infrastructure::storage::StorageError;

#[derive(Debug)]
pub enum AppError {
    Database(String),
    /// SQLITE_BUSY / SQLITE_LOCKED 系。トランザクションをやり直せば通る可能性がある
    Contention(String),
    Network(String),
    Storage(StorageError),
    ConfigurationError(String),
    SerializationError(String),
    Timeout(String),
}

impl AppError {
    /// ローカルストレージの容量不足かどうか
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, AppError::Storage(StorageError::QuotaExceeded { .. }))
    }

    /// リモートストアのロック競合（SQLITE_BUSY / SQLITE_LOCKED）かどうか
    pub fn is_contention(&self) -> bool {
        matches!(self, AppError::Contention(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Contention(msg) => write!(f, "Database busy: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Storage(err) => write!(f, "Storage error: {}", err),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// 拡張リザルトコードの下位 8 ビットが SQLITE_BUSY(5) / SQLITE_LOCKED(6) か
fn is_sqlite_lock_code(code: &str) -> bool {
    code.parse::<i32>()
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                AppError::Network(err.to_string())
            }
            sqlx::Error::Database(db)
                if db.code().is_some_and(|code| is_sqlite_lock_code(&code)) =>
            {
                AppError::Contention(err.to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_errors_are_detectable() {
        let err: AppError = StorageError::QuotaExceeded {
            key: "safepath_attendance".into(),
            needed: 10,
            available: 2,
        }
        .into();
        assert!(err.is_quota_exceeded());
        assert!(!AppError::Network("boom".into()).is_quota_exceeded());
    }

    #[test]
    fn extended_lock_codes_count_as_contention() {
        assert!(is_sqlite_lock_code("5"));
        assert!(is_sqlite_lock_code("6"));
        assert!(is_sqlite_lock_code("517"));
        assert!(is_sqlite_lock_code("262"));
        assert!(!is_sqlite_lock_code("19"));
        assert!(!is_sqlite_lock_code("SQLITE_BUSY"));
        assert!(!AppError::Database("database is locked".into()).is_contention());
    }

    #[tokio::test]
    async fn busy_database_maps_to_contention() {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("busy.db").display());
        let options = SqliteConnectOptions::from_str(&url)
            .unwrap()
            .busy_timeout(Duration::ZERO);
        let holder = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .unwrap();
        let other = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::query("CREATE TABLE t (v INTEGER)")
            .execute(&holder)
            .await
            .unwrap();
        let mut conn = holder.acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.unwrap();

        let err: AppError = sqlx::query("INSERT INTO t (v) VALUES (1)")
            .execute(&other)
            .await
            .unwrap_err()
            .into();
        assert!(err.is_contention(), "unexpected error: {err}");

        sqlx::query("ROLLBACK").execute(&mut *conn).await.unwrap();
    }
}
