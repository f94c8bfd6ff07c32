pub mod attendance_type;
pub mod geo_point;
pub mod record_id;
pub mod student_id;
pub mod time_bucket;

pub use attendance_type::AttendanceType;
pub use geo_point::GeoPoint;
pub use record_id::RecordId;
pub use student_id::StudentId;
pub use time_bucket::{BUCKET_WIDTH_MS, BucketKey, TimeBucket};
