use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub key_prefix: String,
    #[serde(default)]
    pub quota_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub commit_timeout_ms: u64,
    pub max_transaction_attempts: u32,
    pub history_limit: u32,
    /// 他の書き込み元による最新ステータス変更を拾う間隔
    pub live_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub merge_window_ms: i64,
    /// 0 のときは定期フラッシュを行わない
    pub flush_interval_secs: u64,
    pub event_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub max_events: usize,
    pub max_notifications: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("safepath"))
            .unwrap_or_else(|| PathBuf::from("./data"));
        let database_url = format!("sqlite://{}?mode=rwc", data_dir.join("remote.db").display());

        Self {
            storage: StorageConfig {
                data_dir,
                key_prefix: "safepath".to_string(),
                quota_bytes: None,
            },
            remote: RemoteConfig {
                database_url,
                max_connections: 5,
                commit_timeout_ms: 10_000,
                max_transaction_attempts: 5,
                history_limit: 120,
                live_poll_ms: 500,
            },
            sync: SyncConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            merge_window_ms: 60_000,
            flush_interval_secs: 0,
            event_channel_capacity: 64,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            max_notifications: 200,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SAFEPATH_DATA_DIR") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.storage.data_dir = PathBuf::from(trimmed);
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_KEY_PREFIX") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.storage.key_prefix = trimmed.to_string();
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_STORAGE_QUOTA_BYTES") {
            if let Some(value) = parse_u64(&v) {
                cfg.storage.quota_bytes = if value == 0 { None } else { Some(value) };
            }
        }

        // リモートストア設定
        if let Ok(v) = std::env::var("SAFEPATH_REMOTE_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.remote.database_url = trimmed.to_string();
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_REMOTE_MAX_CONNECTIONS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.max_connections = value.clamp(1, u32::MAX as u64) as u32;
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_COMMIT_TIMEOUT_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.commit_timeout_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_MAX_TRANSACTION_ATTEMPTS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.max_transaction_attempts = value.clamp(1, 32) as u32;
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_LIVE_POLL_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.live_poll_ms = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_HISTORY_LIMIT") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.history_limit = value.clamp(1, 10_000) as u32;
            }
        }

        // 同期設定
        if let Ok(v) = std::env::var("SAFEPATH_MERGE_WINDOW_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.merge_window_ms = value.min(i64::MAX as u64) as i64;
            }
        }
        if let Ok(v) = std::env::var("SAFEPATH_FLUSH_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.flush_interval_secs = value;
            }
        }

        if let Ok(v) = std::env::var("SAFEPATH_ANALYTICS_MAX_EVENTS") {
            if let Some(value) = parse_u64(&v) {
                cfg.analytics.max_events = value as usize;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.storage.key_prefix.trim().is_empty() {
            return Err(invalid("Storage key_prefix must not be empty"));
        }
        if self.remote.max_connections == 0 {
            return Err(invalid("Remote max_connections must be greater than 0"));
        }
        if self.remote.commit_timeout_ms == 0 {
            return Err(invalid("Remote commit_timeout_ms must be greater than 0"));
        }
        if self.remote.max_transaction_attempts == 0 {
            return Err(invalid("Remote max_transaction_attempts must be greater than 0"));
        }
        if self.remote.live_poll_ms == 0 {
            return Err(invalid("Remote live_poll_ms must be greater than 0"));
        }
        if self.sync.merge_window_ms <= 0 {
            return Err(invalid("Sync merge_window_ms must be greater than 0"));
        }
        if self.sync.event_channel_capacity == 0 {
            return Err(invalid("Sync event_channel_capacity must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::ConfigurationError(message.to_string())
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
