//! General time utility functions

use std::time::Duration;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a chrono duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Get the period of a cyclic process running at the given frequency.
///
/// Returns `None` if the frequency is not a finite, strictly positive number.
pub fn period_from_hz(frequency_hz: f64) -> Option<Duration> {
    if frequency_hz.is_finite() && frequency_hz > 0.0 {
        Some(Duration::from_secs_f64(1.0 / frequency_hz))
    }
    else {
        None
    }
}
