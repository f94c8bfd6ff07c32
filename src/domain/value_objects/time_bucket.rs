use super::StudentId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BUCKET_WIDTH_MS: i64 = 60_000;

/// 1 分幅の時間バケット。リモートの競合判定単位かつオフラインキューの集約キー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket {
    start_ms: i64,
}

impl TimeBucket {
    pub fn containing(timestamp_ms: i64) -> Self {
        Self {
            // i64::MIN 付近は最初のバケットに張り付かせる
            start_ms: timestamp_ms
                .div_euclid(BUCKET_WIDTH_MS)
                .saturating_mul(BUCKET_WIDTH_MS),
        }
    }

    pub fn from_start_ms(start_ms: i64) -> Self {
        Self::containing(start_ms)
    }

    /// バケット開始時刻（ミリ秒）
    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    /// `floor(timestamp / 60000)`
    pub fn index(&self) -> i64 {
        self.start_ms.div_euclid(BUCKET_WIDTH_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub student_id: StudentId,
    pub bucket: TimeBucket,
}

impl BucketKey {
    pub fn new(student_id: StudentId, bucket: TimeBucket) -> Self {
        Self { student_id, bucket }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.student_id, self.bucket.start_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_floor_to_the_minute() {
        assert_eq!(TimeBucket::containing(0).start_ms(), 0);
        assert_eq!(TimeBucket::containing(59_999).start_ms(), 0);
        assert_eq!(TimeBucket::containing(60_000).start_ms(), 60_000);
        assert_eq!(TimeBucket::containing(125_000).index(), 2);
    }

    #[test]
    fn negative_timestamps_floor_downwards() {
        assert_eq!(TimeBucket::containing(-1).start_ms(), -60_000);
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let lowest = TimeBucket::containing(i64::MIN);
        assert_eq!(lowest.start_ms(), i64::MIN);
        assert_eq!(TimeBucket::containing(i64::MIN + 1), lowest);

        let highest = TimeBucket::containing(i64::MAX);
        assert_eq!(highest.start_ms() % BUCKET_WIDTH_MS, 0);
    }

    #[test]
    fn bucket_key_matches_document_id_format() {
        let key = BucketKey::new(
            StudentId::new("s1".into()).unwrap(),
            TimeBucket::containing(61_000),
        );
        assert_eq!(key.to_string(), "s1_60000");
    }
}
