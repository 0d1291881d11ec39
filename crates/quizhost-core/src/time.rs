use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// All scoring and timer-recovery math in this crate is anchored to this
/// clock rather than to any monotonic/steady clock, because timestamps are
/// persisted and must still make sense after a process restart.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
