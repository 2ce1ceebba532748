//! Relative time windows and bucket spans.
//!
//! SRQL time filters are always relative (`time:last_24h`); they resolve
//! against "now" at compile time. The vocabulary is an open numeric grammar
//! (`last_<N><s|m|h|d>`) rather than a fixed list of presets.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Unit of a relative window or bucket span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

/// A named relative time span (`last_2h`, `last_24h`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeWindow {
    /// Number of units.
    pub amount: i64,
    /// The unit.
    pub unit: TimeUnit,
}

impl RelativeWindow {
    /// Total seconds covered by the window.
    #[must_use]
    pub fn as_seconds(&self) -> i64 {
        self.amount.saturating_mul(self.unit.seconds())
    }

    /// The instant the window starts at, relative to `now`.
    #[must_use]
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.as_seconds())
    }
}

impl std::fmt::Display for RelativeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "last_{}{}", self.amount, self.unit.suffix())
    }
}

/// A bucket span for time-bucketed aggregation (`bucket:5m`).
///
/// Same numeric grammar as [`RelativeWindow`] without the `last_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpan {
    /// Number of units.
    pub amount: i64,
    /// The unit.
    pub unit: TimeUnit,
}

impl BucketSpan {
    /// Total seconds per bucket.
    #[must_use]
    pub fn as_seconds(&self) -> i64 {
        self.amount.saturating_mul(self.unit.seconds())
    }
}

impl std::fmt::Display for BucketSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// Parses a relative window token value (`last_24h`, `last-7d`, `24h`).
#[must_use]
pub fn parse_window(raw: &str) -> Option<RelativeWindow> {
    let normalized = raw.trim().to_lowercase().replace(['_', '-'], "");
    let rest = normalized.strip_prefix("last").unwrap_or(&normalized);
    let (amount, unit) = parse_amount_unit(rest)?;
    Some(RelativeWindow { amount, unit })
}

/// Parses a bucket span token value (`30s`, `5m`, `1h`, `1d`).
#[must_use]
pub fn parse_bucket(raw: &str) -> Option<BucketSpan> {
    let (amount, unit) = parse_amount_unit(raw.trim().to_lowercase().as_str())?;
    Some(BucketSpan { amount, unit })
}

fn parse_amount_unit(value: &str) -> Option<(i64, TimeUnit)> {
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (digits, suffix) = value.split_at(split);
    let amount: i64 = digits.parse().ok()?;
    if amount <= 0 {
        return None;
    }

    let unit = match suffix {
        "s" | "sec" | "secs" | "second" | "seconds" => TimeUnit::Seconds,
        "m" | "min" | "mins" | "minute" | "minutes" => TimeUnit::Minutes,
        "h" | "hour" | "hours" => TimeUnit::Hours,
        "d" | "day" | "days" => TimeUnit::Days,
        _ => return None,
    };

    Some((amount, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_presets() {
        assert_eq!(
            parse_window("last_24h"),
            Some(RelativeWindow {
                amount: 24,
                unit: TimeUnit::Hours
            })
        );
        assert_eq!(
            parse_window("last_2h").unwrap().as_seconds(),
            2 * 3_600
        );
        assert_eq!(parse_window("last_7d").unwrap().as_seconds(), 7 * 86_400);
    }

    #[test]
    fn test_parse_window_is_extensible() {
        // Not limited to the windows seen in the dashboards.
        assert_eq!(parse_window("last_90m").unwrap().as_seconds(), 90 * 60);
        assert_eq!(parse_window("last-3d").unwrap().as_seconds(), 3 * 86_400);
        assert_eq!(parse_window("12h").unwrap().as_seconds(), 12 * 3_600);
    }

    #[test]
    fn test_parse_window_rejects_garbage() {
        assert_eq!(parse_window("yesterday"), None);
        assert_eq!(parse_window("last_h"), None);
        assert_eq!(parse_window("last_0h"), None);
        assert_eq!(parse_window("last_24x"), None);
        assert_eq!(parse_window(""), None);
    }

    #[test]
    fn test_parse_bucket() {
        assert_eq!(parse_bucket("5m").unwrap().as_seconds(), 300);
        assert_eq!(parse_bucket("30s").unwrap().as_seconds(), 30);
        assert_eq!(parse_bucket("1h").unwrap().as_seconds(), 3_600);
        assert_eq!(parse_bucket("h"), None);
    }

    #[test]
    fn test_window_start_from_now() {
        let now = DateTime::parse_from_rfc3339("2026-08-06T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = parse_window("last_2h").unwrap();
        assert_eq!(
            window.start_from(now),
            DateTime::parse_from_rfc3339("2026-08-06T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
        );
    }

    #[test]
    fn test_display_round_trip() {
        let window = parse_window("last_24h").unwrap();
        assert_eq!(window.to_string(), "last_24h");
        assert_eq!(parse_window(&window.to_string()), Some(window));

        let bucket = parse_bucket("5m").unwrap();
        assert_eq!(bucket.to_string(), "5m");
        assert_eq!(parse_bucket(&bucket.to_string()), Some(bucket));
    }
}
