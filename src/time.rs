//! Wall-clock helpers shared by the core services.

/// Current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// True once more than `max_age_secs` have passed since `timestamp`.
pub fn has_expired(timestamp: i64, max_age_secs: i64) -> bool {
    now_timestamp().saturating_sub(timestamp) > max_age_secs
}
