//! Windows FILETIME conversions: 100ns ticks since 1601-01-01.

use std::time::{SystemTime, UNIX_EPOCH};

use vss_types::FILETIME_UNIX_EPOCH;

/// Converts Unix seconds to a Windows FILETIME value.
pub fn from_unix_seconds(unix_seconds: i64) -> u64 {
    (unix_seconds * 10_000_000) as u64 + FILETIME_UNIX_EPOCH
}

/// The current time, expressed as a Windows FILETIME value.
pub fn now() -> u64 {
    let unix_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    from_unix_seconds(unix_seconds)
}

/// Subtracts `hours` one-hour increments from a FILETIME value,
/// expressed in its native 100ns-tick units.
pub fn minus_hours(filetime: u64, hours: u64) -> u64 {
    const TICKS_PER_HOUR: u64 = 10_000_000 * 60 * 60;
    filetime.saturating_sub(hours * TICKS_PER_HOUR)
}
