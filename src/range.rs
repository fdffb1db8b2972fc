use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MINUTE_MILLIS: i64 = 60_000;
pub const HOUR_MILLIS: i64 = MINUTE_MILLIS * 60;
pub const DAY_MILLIS: i64 = HOUR_MILLIS * 24;
pub const WEEK_MILLIS: i64 = DAY_MILLIS * 7;
/// 30-day month.
pub const MONTH_MILLIS: i64 = DAY_MILLIS * 30;
/// 365-day year, leap years ignored.
pub const YEAR_MILLIS: i64 = DAY_MILLIS * 365;

/// A named relative query window, used when no absolute start/end is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    Minute,
    #[default]
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Range {
    pub const ALL: [Range; 6] = [
        Range::Minute,
        Range::Hour,
        Range::Day,
        Range::Week,
        Range::Month,
        Range::Year,
    ];

    /// Case-insensitive lookup; anything unrecognized is `Hour`.
    pub fn parse_lenient(s: &str) -> Range {
        s.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Range::Minute => "minute",
            Range::Hour => "hour",
            Range::Day => "day",
            Range::Week => "week",
            Range::Month => "month",
            Range::Year => "year",
        }
    }

    pub fn millis(&self) -> i64 {
        match self {
            Range::Minute => MINUTE_MILLIS,
            Range::Hour => HOUR_MILLIS,
            Range::Day => DAY_MILLIS,
            Range::Week => WEEK_MILLIS,
            Range::Month => MONTH_MILLIS,
            Range::Year => YEAR_MILLIS,
        }
    }

    /// Granularity samples are aggregated to before charting. The ratio to the
    /// window length is not constant (an hour yields 720 points, a year 365).
    pub fn downsample_interval(&self) -> &'static str {
        match self {
            Range::Minute => "second",
            Range::Hour => "5s",
            Range::Day => "5m",
            Range::Week | Range::Month => "hour",
            Range::Year => "day",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Range::Minute),
            "hour" => Ok(Range::Hour),
            "day" => Ok(Range::Day),
            "week" => Ok(Range::Week),
            "month" => Ok(Range::Month),
            "year" => Ok(Range::Year),
            other => Err(format!("unknown range '{}'", other)),
        }
    }
}

/// Milliseconds in the named range; unknown names get the hour value.
pub fn range_to_millis(range: &str) -> i64 {
    Range::parse_lenient(range).millis()
}

/// Downsample token for the named range; unknown names get `"hour"`.
pub fn downsample_interval(range: &str) -> &'static str {
    Range::parse_lenient(range).downsample_interval()
}

/// Denominator period for throughput fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateUnit {
    #[default]
    PerSecond,
    PerMinute,
    PerHour,
}

impl RateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateUnit::PerSecond => "perSecond",
            RateUnit::PerMinute => "perMinute",
            RateUnit::PerHour => "perHour",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateUnit::PerSecond => "Per Second",
            RateUnit::PerMinute => "Per Minute",
            RateUnit::PerHour => "Per Hour",
        }
    }
}

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "persecond" => Ok(RateUnit::PerSecond),
            "perminute" => Ok(RateUnit::PerMinute),
            "perhour" => Ok(RateUnit::PerHour),
            other => Err(format!("unknown rate unit '{}'", other)),
        }
    }
}
