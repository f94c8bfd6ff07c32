use crate::domain::entities::{AttendanceRecord, CommitDecision, LatestStatus};
use crate::domain::value_objects::StudentId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use tokio::sync::watch;

/// 最新ステータスの購読ハンドル。変更がまとめて届くことはあるが、最後の値は必ず観測できる。
pub type LatestStatusSubscription = watch::Receiver<Option<LatestStatus>>;

#[async_trait]
pub trait RemoteAttendanceStore: Send + Sync {
    /// バケット単位の条件付き書き込み。トランスポート失敗は `Err` で返す。
    async fn commit(&self, record: &AttendanceRecord) -> Result<CommitDecision, AppError>;
    async fn fetch_history(
        &self,
        student_id: &StudentId,
        limit: u32,
    ) -> Result<Vec<AttendanceRecord>, AppError>;
    async fn latest_status(&self, student_id: &StudentId) -> Result<Option<LatestStatus>, AppError>;
    async fn subscribe_latest(
        &self,
        student_id: &StudentId,
    ) -> Result<LatestStatusSubscription, AppError>;
}
