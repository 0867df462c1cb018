// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Duration parsing for key lifecycle intervals.
//!
//! Key resources express intervals as an integer with an optional unit suffix
//! (e.g., "2w", "1y", "90d", "3600"). Units use fixed multipliers, so a year is
//! always 365 days and a month always 30 days.

use std::time::Duration;

use crate::constants::{
    SECONDS_PER_DAY, SECONDS_PER_HOUR, SECONDS_PER_MINUTE, SECONDS_PER_MONTH, SECONDS_PER_WEEK,
    SECONDS_PER_YEAR,
};
use crate::errors::ConfigError;

/// Parse a key lifecycle duration string into a Rust `Duration`.
///
/// Supported units:
/// - `y` (years of 365 days): "1y" = 31536000 seconds
/// - `mo` (months of 30 days): "1mo" = 2592000 seconds
/// - `w` (weeks): "2w" = 1209600 seconds
/// - `d` (days): "30d" = 2592000 seconds
/// - `h` (hours): "24h" = 86400 seconds
/// - `mi` (minutes): "90mi" = 5400 seconds
/// - no unit: plain seconds
///
/// # Examples
///
/// ```
/// use keyroll::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("2w").unwrap(), Duration::from_secs(1_209_600));
/// assert_eq!(parse_duration("1y").unwrap(), Duration::from_secs(31_536_000));
/// assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3600));
///
/// assert!(parse_duration("").is_err());
/// assert!(parse_duration("10x").is_err());
/// assert!(parse_duration("w").is_err());
/// ```
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] if:
/// - The string is empty or has no leading digits
/// - The unit is not one of `y`, `mo`, `w`, `d`, `h`, `mi`
/// - The value overflows when converted to seconds
pub fn parse_duration(duration_str: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: duration_str.to_string(),
        reason: reason.to_string(),
    };

    if duration_str.is_empty() {
        return Err(invalid("duration string cannot be empty"));
    }

    // Find where digits end and unit begins
    let split_pos = duration_str
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(duration_str.len());

    let (value_str, unit) = duration_str.split_at(split_pos);

    if value_str.is_empty() {
        return Err(invalid("duration must start with a positive integer"));
    }

    let value: u64 = value_str
        .parse()
        .map_err(|_| invalid("duration value too large"))?;

    let multiplier = match unit {
        "" => 1,
        "mi" => SECONDS_PER_MINUTE,
        "h" => SECONDS_PER_HOUR,
        "d" => SECONDS_PER_DAY,
        "w" => SECONDS_PER_WEEK,
        "mo" => SECONDS_PER_MONTH,
        "y" => SECONDS_PER_YEAR,
        other => {
            return Err(invalid(&format!(
                "unsupported unit '{other}', use y, mo, w, d, h or mi"
            )))
        }
    };

    let seconds = value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("duration value too large (overflow)"))?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod duration_tests;
