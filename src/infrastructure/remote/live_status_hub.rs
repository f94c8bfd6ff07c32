use crate::domain::entities::LatestStatus;
use crate::domain::value_objects::StudentId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

/// 生徒ごとの最新ステータス配信チャネル
#[derive(Default)]
pub struct LiveStatusHub {
    channels: Mutex<HashMap<StudentId, watch::Sender<Option<LatestStatus>>>>,
}

impl LiveStatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存チャネルがなければ `current` を初期値に作る。新規作成なら第 2 要素が true。
    pub fn subscribe(
        &self,
        student_id: &StudentId,
        current: Option<LatestStatus>,
    ) -> (watch::Receiver<Option<LatestStatus>>, bool) {
        match self.channels.lock() {
            Ok(mut channels) => {
                if let Some(sender) = channels.get(student_id) {
                    return (sender.subscribe(), false);
                }
                let (sender, receiver) = watch::channel(current);
                channels.insert(student_id.clone(), sender);
                (receiver, true)
            }
            Err(_) => {
                tracing::warn!(target: "attendance::remote", "live status hub lock poisoned");
                (watch::channel(None).1, false)
            }
        }
    }

    pub fn publish(&self, student_id: &StudentId, status: Option<LatestStatus>) {
        let Ok(channels) = self.channels.lock() else {
            return;
        };
        let Some(sender) = channels.get(student_id) else {
            return;
        };

        sender.send_if_modified(|slot| {
            if *slot == status {
                false
            } else {
                *slot = status;
                true
            }
        });
    }

    /// 購読者がいなくなったチャネルを破棄する。破棄した（または元々無い）なら true。
    pub fn retire_if_idle(&self, student_id: &StudentId) -> bool {
        let Ok(mut channels) = self.channels.lock() else {
            return true;
        };
        match channels.get(student_id) {
            Some(sender) if sender.receiver_count() > 0 => false,
            Some(_) => {
                channels.remove(student_id);
                true
            }
            None => true,
        }
    }
}
