//! # Internet time
//! Swatch-style "beats": the UTC+1 day divided into 1000 parts, rendered as
//! `DDD.DD`.
//!
//! Pure and timezone-database free; the +1 hour offset is applied directly
//! (Biel Mean Time has no daylight saving).

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const BEATS_PER_DAY: f64 = 1_000.0;

/// Half a beat (one beat is 86.4 s); display drivers sample at this rate.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(43_200);

/// Map `value` into the half-open interval between `a` and `b` using
/// mathematical (floored) modulo. Bounds may be given in either order.
pub fn wrap(value: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let range = hi - lo;
    if range == 0.0 || !range.is_finite() {
        return lo;
    }
    let mut r = (value - lo).rem_euclid(range);
    // rem_euclid can round a tiny negative offset up to `range`
    if r >= range {
        r = 0.0;
    }
    r + lo
}

/// Beats for `instant` as a number in `[0, 1000)`.
pub fn beats(instant: DateTime<Utc>) -> f64 {
    let seconds = f64::from(instant.timestamp_subsec_millis()) / 1000.0
        + f64::from(instant.second())
        + f64::from(instant.minute()) * 60.0
        + f64::from(instant.hour() + 1) * 3600.0;
    wrap(seconds / SECONDS_PER_DAY * BEATS_PER_DAY, 0.0, BEATS_PER_DAY)
}

/// `DDD.DD` for `instant`.
pub fn internet_time(instant: DateTime<Utc>) -> String {
    let formatted = format!("{:06.2}", beats(instant));
    // 999.995.. rounds to "1000.00"; keep the last six chars so it reads "000.00".
    let start = formatted.len().saturating_sub(6);
    formatted[start..].to_string()
}

pub fn internet_time_now() -> String {
    internet_time(Utc::now())
}

/// A single digit position that changed between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitTransition {
    /// Byte index in the `DDD.DD` string.
    pub index: usize,
    pub from: u8,
    pub to: u8,
    /// Signed steps along the shorter way round the 0..=9 wheel.
    pub steps: i8,
}

/// Shortest signed roll from one digit to another; `9 -> 0` is `+1`,
/// `0 -> 9` is `-1`, a five-step tie rolls forward.
pub fn roll_steps(from: u8, to: u8) -> i8 {
    let forward = (i16::from(to) - i16::from(from)).rem_euclid(10);
    if forward > 5 {
        (forward - 10) as i8
    } else {
        forward as i8
    }
}

/// Changed digits between two beat strings, in display order.
pub fn digit_transitions(prev: &str, next: &str) -> Vec<DigitTransition> {
    prev.bytes()
        .zip(next.bytes())
        .enumerate()
        .filter(|(_, (a, b))| a != b && a.is_ascii_digit() && b.is_ascii_digit())
        .map(|(index, (a, b))| {
            let (from, to) = (a - b'0', b - b'0');
            DigitTransition {
                index,
                from,
                to,
                steps: roll_steps(from, to),
            }
        })
        .collect()
}
