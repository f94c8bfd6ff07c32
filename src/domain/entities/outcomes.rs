use serde::{Deserialize, Serialize};
use std::fmt;

/// ローカルログへの取り込み結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Saved,
    Merged,
    RejectedOutdated,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Saved => "saved",
            ReconcileOutcome::Merged => "merged",
            ReconcileOutcome::RejectedOutdated => "rejected_outdated",
        }
    }

    /// 通知対象となる書き込みが発生したか
    pub fn is_write(&self) -> bool {
        matches!(self, ReconcileOutcome::Saved | ReconcileOutcome::Merged)
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件付き書き込みトランザクションの判定（トランスポート失敗は含まない）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitDecision {
    Saved,
    RejectedOutdated,
}

/// リモートコミットの最終結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "message")]
pub enum CommitOutcome {
    Saved,
    RejectedOutdated,
    Error(String),
}

impl CommitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitOutcome::Saved => "saved",
            CommitOutcome::RejectedOutdated => "rejected_outdated",
            CommitOutcome::Error(_) => "error",
        }
    }

    /// キューの枠を解放してよい終端結果か
    pub fn is_resolved(&self) -> bool {
        matches!(self, CommitOutcome::Saved | CommitOutcome::RejectedOutdated)
    }
}

impl From<CommitDecision> for CommitOutcome {
    fn from(value: CommitDecision) -> Self {
        match value {
            CommitDecision::Saved => CommitOutcome::Saved,
            CommitDecision::RejectedOutdated => CommitOutcome::RejectedOutdated,
        }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
