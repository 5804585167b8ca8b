use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering convention for whole-second timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStyle {
    /// `HH:MM:SS`
    Colon,
    /// `HHhMMmSSs`, safe to embed in filenames
    #[default]
    UnitSuffixed,
}

impl fmt::Display for TimestampStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampStyle::Colon => write!(f, "colon"),
            TimestampStyle::UnitSuffixed => write!(f, "unit_suffixed"),
        }
    }
}

/// Format seconds as a fixed-width duration string.
///
/// The fractional part is truncated. Callers clamp negative offsets before
/// formatting; anything below zero or non-finite renders as zero.
pub fn format_timestamp(seconds: f64, style: TimestampStyle) -> String {
    let total_seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    match style {
        TimestampStyle::Colon => format!("{:02}:{:02}:{:02}", hours, minutes, seconds),
        TimestampStyle::UnitSuffixed => format!("{:02}h{:02}m{:02}s", hours, minutes, seconds),
    }
}

/// Parse a string produced by [`format_timestamp`] back into whole seconds.
/// Either style is accepted.
pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let trimmed = timestamp.trim();

    let parts: Vec<&str> = if trimmed.contains(':') {
        trimmed.split(':').collect()
    } else {
        trimmed
            .strip_suffix('s')
            .ok_or_else(|| anyhow!("Invalid timestamp format: {}", timestamp))?
            .split(['h', 'm'])
            .collect()
    };

    if parts.len() != 3 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].parse()?;
    let minutes: u64 = parts[1].parse()?;
    let seconds: u64 = parts[2].parse()?;

    if minutes >= 60 || seconds >= 60 {
        return Err(anyhow!("Out of range component in timestamp: {}", timestamp));
    }

    Ok(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hour_one_minute_one_second() {
        assert_eq!(format_timestamp(3661.0, TimestampStyle::Colon), "01:01:01");
        assert_eq!(format_timestamp(3661.0, TimestampStyle::UnitSuffixed), "01h01m01s");
    }

    #[test]
    fn test_fraction_is_truncated() {
        assert_eq!(format_timestamp(59.999, TimestampStyle::Colon), "00:00:59");
        assert_eq!(format_timestamp(0.4, TimestampStyle::UnitSuffixed), "00h00m00s");
    }

    #[test]
    fn test_out_of_contract_input_renders_zero() {
        assert_eq!(format_timestamp(-3.0, TimestampStyle::Colon), "00:00:00");
        assert_eq!(format_timestamp(f64::NAN, TimestampStyle::Colon), "00:00:00");
    }

    #[test]
    fn test_hours_beyond_two_digits() {
        assert_eq!(format_timestamp(360_000.0, TimestampStyle::Colon), "100:00:00");
    }

    #[test]
    fn test_round_trip_to_integer_seconds() {
        for &s in &[0.0, 1.5, 59.0, 60.0, 61.2, 3599.9, 3661.0, 86_399.0, 123_456.7] {
            for style in [TimestampStyle::Colon, TimestampStyle::UnitSuffixed] {
                let rendered = format_timestamp(s, style);
                assert_eq!(parse_timestamp(&rendered).unwrap(), s.trunc() as u64, "{}", rendered);
            }
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("12:34").is_err());
        assert!(parse_timestamp("00h61m00s").is_err());
        assert!(parse_timestamp("abc").is_err());
    }
}
