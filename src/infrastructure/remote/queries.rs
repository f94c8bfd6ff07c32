pub(super) const SELECT_BUCKET_TIMESTAMP: &str = r#"
    SELECT timestamp
    FROM attendance_buckets
    WHERE student_id = ?1 AND bucket_ms = ?2
"#;

pub(super) const UPSERT_BUCKET: &str = r#"
    INSERT INTO attendance_buckets (
        student_id,
        bucket_ms,
        event_id,
        record_type,
        timestamp,
        synced,
        latitude,
        longitude,
        updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8)
    ON CONFLICT(student_id, bucket_ms) DO UPDATE SET
        event_id = excluded.event_id,
        record_type = excluded.record_type,
        timestamp = excluded.timestamp,
        synced = 1,
        latitude = excluded.latitude,
        longitude = excluded.longitude,
        updated_at = excluded.updated_at
"#;

pub(super) const UPSERT_LATEST: &str = r#"
    INSERT INTO attendance_latest (
        student_id,
        last_type,
        last_event_id,
        bucket_ms,
        record_timestamp,
        latitude,
        longitude,
        last_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(student_id) DO UPDATE SET
        last_type = excluded.last_type,
        last_event_id = excluded.last_event_id,
        bucket_ms = excluded.bucket_ms,
        record_timestamp = excluded.record_timestamp,
        latitude = excluded.latitude,
        longitude = excluded.longitude,
        last_at = excluded.last_at
"#;

pub(super) const SELECT_HISTORY: &str = r#"
    SELECT student_id, bucket_ms, event_id, record_type, timestamp, synced, latitude, longitude
    FROM attendance_buckets
    WHERE student_id = ?1
    ORDER BY timestamp DESC
    LIMIT ?2
"#;

pub(super) const SELECT_BUCKET: &str = r#"
    SELECT student_id, bucket_ms, event_id, record_type, timestamp, synced, latitude, longitude
    FROM attendance_buckets
    WHERE student_id = ?1 AND bucket_ms = ?2
"#;

pub(super) const SELECT_LATEST: &str = r#"
    SELECT student_id, last_type, last_event_id, bucket_ms, record_timestamp, latitude, longitude
    FROM attendance_latest
    WHERE student_id = ?1
"#;
