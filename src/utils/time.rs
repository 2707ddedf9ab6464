use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Wall-clock duration since the unix epoch, zero if the clock is before it
pub(crate) fn get_duration_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// return millisecond
pub fn timestamp_millis() -> u64 {
    get_duration_since_epoch().as_millis() as u64
}
