use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlushOutcomeStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub total_sent: u64,
    pub total_failed: u64,
    pub flush_cycles: u64,
    pub consecutive_failure: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
    pub last_outcome: Option<FlushOutcomeStatus>,
    pub last_trigger: Option<String>,
    pub last_sent: Option<u32>,
    pub last_failed: Option<u32>,
    pub last_duration_ms: Option<u64>,
}

#[derive(Default, Clone)]
struct LastFlush {
    outcome: Option<FlushOutcomeStatus>,
    trigger: Option<String>,
    sent: Option<u32>,
    failed: Option<u32>,
    duration_ms: Option<u64>,
}

/// フラッシュ結果のカウンタ。サービスごとに 1 つ持つ。
pub struct SyncMetrics {
    sent: AtomicU64,
    failed: AtomicU64,
    cycles: AtomicU64,
    consecutive_failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
    last: Mutex<LastFlush>,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            consecutive_failure: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(0),
            last_failure_ms: AtomicU64::new(0),
            last: Mutex::new(LastFlush::default()),
        }
    }

    /// 1 件でも失敗が残ったサイクルは Failure として数える
    pub fn record_flush(&self, trigger: &str, sent: u32, failed: u32, duration_ms: u64) {
        let status = if failed == 0 {
            FlushOutcomeStatus::Success
        } else {
            FlushOutcomeStatus::Failure
        };

        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.sent.fetch_add(u64::from(sent), Ordering::Relaxed);
        self.failed.fetch_add(u64::from(failed), Ordering::Relaxed);
        match status {
            FlushOutcomeStatus::Success => {
                self.last_success_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.store(0, Ordering::Relaxed);
            }
            FlushOutcomeStatus::Failure => {
                self.last_failure_ms
                    .store(current_unix_ms(), Ordering::Relaxed);
                self.consecutive_failure.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut guard) = self.last.lock() {
            guard.outcome = Some(status);
            guard.trigger = Some(trigger.to_string());
            guard.sent = Some(sent);
            guard.failed = Some(failed);
            guard.duration_ms = Some(duration_ms);
        }
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let last = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        SyncMetricsSnapshot {
            total_sent: self.sent.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            flush_cycles: self.cycles.load(Ordering::Relaxed),
            consecutive_failure: self.consecutive_failure.load(Ordering::Relaxed),
            last_success_ms: to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: to_option(self.last_failure_ms.load(Ordering::Relaxed)),
            last_outcome: last.outcome,
            last_trigger: last.trigger,
            last_sent: last.sent,
            last_failed: last.failed,
            last_duration_ms: last.duration_ms,
        }
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
