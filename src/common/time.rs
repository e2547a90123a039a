//! Monotonic timing helpers for latency reporting.

use std::time::Instant;

/// Milliseconds elapsed since `start`, with sub-millisecond precision.
pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Round to one decimal place, the precision used in API responses.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
