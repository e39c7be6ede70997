//! Time granularities and period labels.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three parallel aggregation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Calendar hour, labelled `YYYY-MM-DD HH`.
    Hour,
    /// Calendar day, labelled `YYYY-MM-DD`.
    Day,
    /// ISO-8601 week, labelled `YYYY-Www`.
    Week,
}

impl Granularity {
    /// All granularities in table order.
    pub const ALL: [Self; 3] = [Self::Hour, Self::Day, Self::Week];

    /// Start of the period containing `at`. All arithmetic is in UTC.
    #[must_use]
    pub fn truncate(self, at: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = at.date_naive().and_time(NaiveTime::MIN);
        let start = match self {
            Self::Hour => midnight + Duration::hours(i64::from(at.hour())),
            Self::Day => midnight,
            Self::Week => {
                midnight - Duration::days(i64::from(at.weekday().num_days_from_monday()))
            }
        };
        start.and_utc()
    }

    /// Length of one period.
    #[must_use]
    pub fn span(self) -> Duration {
        match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
            Self::Week => Duration::weeks(1),
        }
    }

    /// Half-open `[start, end)` bounds of the period containing `at`.
    #[must_use]
    pub fn bounds(self, at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.truncate(at);
        (start, start + self.span())
    }

    /// Canonical label of the period containing `at`.
    #[must_use]
    pub fn label(self, at: DateTime<Utc>) -> String {
        let format = match self {
            Self::Hour => "%Y-%m-%d %H",
            Self::Day => "%Y-%m-%d",
            // ISO week-numbering year, so 2024-12-30 is 2025-W01.
            Self::Week => "%G-W%V",
        };
        at.format(format).to_string()
    }

    /// Name of the exported counter for this granularity.
    #[must_use]
    pub const fn metric_name(self) -> &'static str {
        match self {
            Self::Hour => "user_ops_hourly",
            Self::Day => "user_ops_daily",
            Self::Week => "user_ops_weekly",
        }
    }

    /// Name of the period label on the exported counter.
    #[must_use]
    pub const fn label_name(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Self::Hour),
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}
