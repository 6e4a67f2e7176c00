//! Timestamp helpers. All record times are Unix milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds.
///
/// A clock set before 1970 reads as 0.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Next modification time for a record last modified at `previous`.
///
/// Strictly greater than `previous` even if the clock went backwards or two
/// writes land in the same millisecond.
pub fn next_modified(previous: i64, now: i64) -> i64 {
    now.max(previous.saturating_add(1))
}
