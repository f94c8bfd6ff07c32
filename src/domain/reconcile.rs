//! ローカルログの先頭に対する新規イベントの取り込み判定。
//!
//! 判定は純粋関数で行い、ログの書き換えは `AttendanceLog` 側が担う。

use super::entities::{AttendanceRecord, ReconcileOutcome};
use super::value_objects::AttendanceType;

pub const DEFAULT_MERGE_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// 新しい先頭として挿入
    Accept,
    /// 先頭を書き換える（id は維持）
    Merge,
    /// 同時刻または古い候補
    RejectOutdated,
}

impl MergeDecision {
    pub fn outcome(&self) -> ReconcileOutcome {
        match self {
            MergeDecision::Accept => ReconcileOutcome::Saved,
            MergeDecision::Merge => ReconcileOutcome::Merged,
            MergeDecision::RejectOutdated => ReconcileOutcome::RejectedOutdated,
        }
    }
}

/// 時刻順序が種別より優先される。ウィンドウ内では種別が食い違っても最新側に畳み込む。
pub fn decide(
    candidate: &AttendanceRecord,
    head: Option<&AttendanceRecord>,
    min_interval_ms: i64,
) -> MergeDecision {
    let Some(head) = head else {
        return MergeDecision::Accept;
    };

    if candidate.timestamp <= head.timestamp {
        return MergeDecision::RejectOutdated;
    }

    // candidate.timestamp > head.timestamp なので差分は正
    let delta = candidate.timestamp.saturating_sub(head.timestamp);
    if delta < min_interval_ms {
        MergeDecision::Merge
    } else {
        MergeDecision::Accept
    }
}

pub fn merge_into(head: &mut AttendanceRecord, candidate: &AttendanceRecord) {
    head.timestamp = candidate.timestamp;
    head.attendance_type = candidate.attendance_type;
    head.location = candidate.location;
    head.synced = candidate.synced;
}

/// ゲート通過時の向き。先頭が無いか LOGOUT なら LOGIN。
pub fn next_attendance_type(head: Option<&AttendanceRecord>) -> AttendanceType {
    match head {
        Some(record) if record.attendance_type == AttendanceType::Login => AttendanceType::Logout,
        _ => AttendanceType::Login,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{GeoPoint, RecordId, StudentId};

    fn record(id: &str, timestamp: i64, attendance_type: AttendanceType) -> AttendanceRecord {
        AttendanceRecord::new(
            RecordId::new(id.to_string()).unwrap(),
            StudentId::new("student-1".to_string()).unwrap(),
            timestamp,
            attendance_type,
            None,
        )
    }

    #[test]
    fn empty_log_accepts() {
        let candidate = record("a", 1_000, AttendanceType::Login);
        assert_eq!(
            decide(&candidate, None, DEFAULT_MERGE_WINDOW_MS),
            MergeDecision::Accept
        );
    }

    #[test]
    fn same_type_within_window_merges_and_keeps_id() {
        let mut head = record("a", 1_000, AttendanceType::Login);
        let candidate = record("b", 59_000, AttendanceType::Login);

        let decision = decide(&candidate, Some(&head), DEFAULT_MERGE_WINDOW_MS);
        assert_eq!(decision, MergeDecision::Merge);

        merge_into(&mut head, &candidate);
        assert_eq!(head.id.as_str(), "a");
        assert_eq!(head.timestamp, 59_000);
        assert_eq!(head.attendance_type, AttendanceType::Login);
    }

    #[test]
    fn opposite_type_within_window_collapses_to_newest() {
        let mut head = record("a", 1_000, AttendanceType::Login);
        let mut candidate = record("b", 11_000, AttendanceType::Logout);
        candidate.location = Some(GeoPoint::new(1.0, 2.0));

        assert_eq!(
            decide(&candidate, Some(&head), DEFAULT_MERGE_WINDOW_MS),
            MergeDecision::Merge
        );
        merge_into(&mut head, &candidate);
        assert_eq!(head.id.as_str(), "a");
        assert_eq!(head.timestamp, 11_000);
        assert_eq!(head.attendance_type, AttendanceType::Logout);
        assert_eq!(head.location, Some(GeoPoint::new(1.0, 2.0)));
    }

    #[test]
    fn older_or_equal_candidates_are_rejected() {
        let head = record("a", 2_000, AttendanceType::Login);
        for ts in [1_000, 2_000] {
            let candidate = record("b", ts, AttendanceType::Logout);
            assert_eq!(
                decide(&candidate, Some(&head), DEFAULT_MERGE_WINDOW_MS),
                MergeDecision::RejectOutdated
            );
        }
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let head = record("a", 0, AttendanceType::Login);
        let at_59s = record("b", 59_999, AttendanceType::Logout);
        let at_60s = record("c", 60_000, AttendanceType::Logout);

        assert_eq!(
            decide(&at_59s, Some(&head), DEFAULT_MERGE_WINDOW_MS),
            MergeDecision::Merge
        );
        assert_eq!(
            decide(&at_60s, Some(&head), DEFAULT_MERGE_WINDOW_MS),
            MergeDecision::Accept
        );
    }

    #[test]
    fn head_timestamp_never_regresses() {
        let stamps = [5_000, 3_000, 30_000, 30_000, 200_000, 150_000, 201_000];
        let mut head: Option<AttendanceRecord> = None;

        for (i, ts) in stamps.iter().enumerate() {
            let candidate = record(&format!("r{i}"), *ts, AttendanceType::Login);
            let before = head.as_ref().map(|h| h.timestamp);
            match decide(&candidate, head.as_ref(), DEFAULT_MERGE_WINDOW_MS) {
                MergeDecision::Accept => head = Some(candidate),
                MergeDecision::Merge => {
                    if let Some(h) = head.as_mut() {
                        merge_into(h, &candidate);
                    }
                }
                MergeDecision::RejectOutdated => {}
            }
            let after = head.as_ref().map(|h| h.timestamp);
            assert!(after >= before);
        }
        assert_eq!(head.map(|h| h.timestamp), Some(201_000));
    }

    #[test]
    fn next_type_toggles_from_head() {
        assert_eq!(next_attendance_type(None), AttendanceType::Login);
        let login = record("a", 1, AttendanceType::Login);
        let logout = record("b", 2, AttendanceType::Logout);
        assert_eq!(next_attendance_type(Some(&login)), AttendanceType::Logout);
        assert_eq!(next_attendance_type(Some(&logout)), AttendanceType::Login);
    }
}
