use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeSuffixError {
    #[error("'{0}' is not a valid duration (expected a number optionally followed by ms/s/m/h)")]
    Malformed(String),
}

/// Parses a duration with an optional unit suffix (spec §6, §8 property 4).
/// A bare number is milliseconds, matching the original's raw-millisecond
/// config values.
pub fn parse_duration(s: &str) -> Result<Duration, TimeSuffixError> {
    let s = s.trim();
    let (digits, unit_ms) = if let Some(d) = s.strip_suffix("ms") {
        (d, 1u64)
    } else if let Some(d) = s.strip_suffix('h') {
        (d, 3_600_000)
    } else if let Some(d) = s.strip_suffix('m') {
        (d, 60_000)
    } else if let Some(d) = s.strip_suffix('s') {
        (d, 1_000)
    } else {
        (s, 1)
    };
    let n: u64 = digits.trim().parse().map_err(|_| TimeSuffixError::Malformed(s.to_string()))?;
    Ok(Duration::from_millis(n * unit_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_is_milliseconds() {
        assert_eq!(parse_duration("3000").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn explicit_ms_suffix() {
        assert_eq!(parse_duration("3000ms").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn seconds_suffix() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn minutes_suffix() {
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
    }

    #[test]
    fn hours_suffix() {
        assert_eq!(parse_duration("3h").unwrap(), Duration::from_secs(10800));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("3x").is_err());
    }
}
