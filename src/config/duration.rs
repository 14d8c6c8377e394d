//! Human-readable duration strings
//!
//! Timeouts are configured as `<number> <unit>`, e.g. `30 secs`, `1 min`,
//! `500 millis` or `2.5s`. A bare number is read as seconds.

use std::time::Duration;

/// Parses a duration string
///
/// Returns `None` for empty, negative, zero, or otherwise unparsable input.
///
/// # Examples
///
/// ```
/// use nar_harvest::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30 secs"), Some(Duration::from_secs(30)));
/// assert_eq!(parse_duration("1 min"), Some(Duration::from_secs(60)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let value: f64 = number.parse().ok()?;
    let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => 1e-9,
        "us" | "micro" | "micros" | "microsecond" | "microseconds" => 1e-6,
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1e-3,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => 86_400.0,
        _ => return None,
    };

    let duration = Duration::try_from_secs_f64(value * seconds_per_unit).ok()?;
    (!duration.is_zero()).then_some(duration)
}
