use crate::application::ports::remote_store::LatestStatusSubscription;
use crate::domain::entities::LatestStatus;
use crate::domain::value_objects::RecordId;

/// 最新ステータス購読のうち、イベント ID が変わったときだけ値を返すラッパー。
/// 保護者ダッシュボードの「1 イベントにつき 1 回だけ知らせる」用途。
pub struct DistinctLatestStatus {
    rx: LatestStatusSubscription,
    last_event_id: Option<RecordId>,
    primed: bool,
}

impl DistinctLatestStatus {
    pub fn new(rx: LatestStatusSubscription) -> Self {
        Self {
            rx,
            last_event_id: None,
            primed: false,
        }
    }

    /// 購読元が閉じたら `None`
    pub async fn next(&mut self) -> Option<LatestStatus> {
        if !self.primed {
            self.primed = true;
            let current = self.rx.borrow_and_update().clone();
            if let Some(status) = self.accept(current) {
                return Some(status);
            }
        }

        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let current = self.rx.borrow_and_update().clone();
            if let Some(status) = self.accept(current) {
                return Some(status);
            }
        }
    }

    fn accept(&mut self, current: Option<LatestStatus>) -> Option<LatestStatus> {
        let status = current?;
        if self.last_event_id.as_ref() == Some(&status.last_event_id) {
            return None;
        }
        self.last_event_id = Some(status.last_event_id.clone());
        Some(status)
    }
}
