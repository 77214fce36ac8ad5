//! Per-field parsers.
//!
//! Each parser returns `None` for text it cannot interpret; the normalizer
//! decides whether that becomes a median fill, a zero fill, or an undefined
//! value.

use chrono::{NaiveTime, Timelike};

/// Maximum fractional digits accepted in a lap time (microseconds).
const MAX_FRACTION_DIGITS: usize = 6;

/// Parsed elapsed race time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalTime {
    /// `hours * 3600 + minutes * 60 + seconds`.
    pub seconds: f64,
    /// Hour component.
    pub hour: u8,
}

/// Trimmed cell text, or `None` if the cell is empty.
pub fn non_empty(cell: &str) -> Option<&str> {
    let trimmed = cell.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn is_leap_second(t: &NaiveTime) -> bool {
    t.nanosecond() >= 1_000_000_000
}

/// Parse `HH:MM:SS`.
pub fn parse_total_time(cell: &str) -> Option<TotalTime> {
    let t = NaiveTime::parse_from_str(cell.trim(), "%H:%M:%S").ok()?;
    if is_leap_second(&t) {
        return None;
    }
    Some(TotalTime {
        seconds: (t.hour() * 3600 + t.minute() * 60 + t.second()) as f64,
        hour: t.hour() as u8,
    })
}

/// Parse `MM:SS.ffffff` into seconds. The fraction is required and holds 1 to 6 digits.
pub fn parse_lap_time(cell: &str) -> Option<f64> {
    let text = cell.trim();
    let (_, fraction) = text.split_once('.')?;
    if fraction.is_empty()
        || fraction.len() > MAX_FRACTION_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let t = NaiveTime::parse_from_str(&format!("00:{text}"), "%H:%M:%S%.f").ok()?;
    if is_leap_second(&t) {
        return None;
    }
    let micros = t.nanosecond() / 1_000;
    Some((t.minute() * 60 + t.second()) as f64 + micros as f64 / 1e6)
}

/// Parse a finite floating-point speed.
pub fn parse_speed(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative count. Decimal text is truncated toward zero.
pub fn parse_count(cell: &str) -> Option<u32> {
    let text = cell.trim();
    if let Ok(n) = text.parse::<u32>() {
        return Some(n);
    }
    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value <= u32::MAX as f64 {
        Some(value.trunc() as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_total_time() {
        let t = parse_total_time("13:45:30").unwrap();
        assert_relative_eq!(t.seconds, 49530.0);
        assert_eq!(t.hour, 13);
    }

    #[test]
    fn test_total_time_midnight_is_defined() {
        let t = parse_total_time("00:00:00").unwrap();
        assert_eq!(t.hour, 0);
        assert_eq!(t.seconds, 0.0);
    }

    #[test]
    fn test_total_time_invalid() {
        assert_eq!(parse_total_time("bad"), None);
        assert_eq!(parse_total_time(""), None);
        assert_eq!(parse_total_time("24:00:00"), None);
        assert_eq!(parse_total_time("12:60:00"), None);
        assert_eq!(parse_total_time("12:00:60"), None);
        assert_eq!(parse_total_time("12:00:00 extra"), None);
    }

    #[test]
    fn test_lap_time() {
        assert_relative_eq!(parse_lap_time("03:27.451").unwrap(), 207.451, epsilon = 1e-9);
        assert_relative_eq!(parse_lap_time("3:27.451").unwrap(), 207.451, epsilon = 1e-9);
        assert_relative_eq!(parse_lap_time("03:30.123456").unwrap(), 210.123456, epsilon = 1e-9);
    }

    #[test]
    fn test_lap_time_invalid() {
        assert_eq!(parse_lap_time("03:27"), None);
        assert_eq!(parse_lap_time("03:27."), None);
        assert_eq!(parse_lap_time("03:27.1234567"), None);
        assert_eq!(parse_lap_time("60:00.0"), None);
        assert_eq!(parse_lap_time("n/a"), None);
    }

    #[test]
    fn test_speed() {
        assert_eq!(parse_speed(" 241.3 "), Some(241.3));
        assert_eq!(parse_speed("NaN"), None);
        assert_eq!(parse_speed("inf"), None);
        assert_eq!(parse_speed("fast"), None);
    }

    #[test]
    fn test_count() {
        assert_eq!(parse_count("3"), Some(3));
        assert_eq!(parse_count("3.0"), Some(3));
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("many"), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" Michelin "), Some("Michelin"));
    }
}
