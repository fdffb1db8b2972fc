//! Timestamp normalization for charting.
//!
//! The charting side renders instants in the viewer's local zone. To show a
//! different zone, each instant is shifted by the difference between the
//! local offset and the target offset, so the local wall-clock rendering
//! reads as the target zone's wall clock.

use std::fmt::Display;

use chrono::{DateTime, Local, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::models::DataPoint;
use crate::query::QueryConfig;
use crate::{ConsoleError, Result};

pub const DETAIL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DETAIL_FORMAT_ZONED: &str = "%Y-%m-%d %H:%M:%S %:z %Z";

/// When zone offsets are evaluated while shifting points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetStrategy {
    /// One shift computed at the current moment and applied to every point.
    /// Points on the other side of a DST transition from "now" end up an
    /// hour off.
    #[default]
    CurrentMoment,
    /// Offsets evaluated at each point's own instant.
    PerPoint,
}

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse::<Tz>()
        .map_err(|_| ConsoleError::InvalidTimezone(tz.to_string()))
}

/// Epoch milliseconds to an instant; `None` when out of chrono's range.
pub fn instant(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(timestamp).single()
}

/// Sets each point's `date` straight from its UTC `timestamp`.
pub fn convert_timestamps(points: Vec<DataPoint>) -> Vec<DataPoint> {
    points
        .into_iter()
        .map(|mut point| {
            point.date = instant(point.timestamp);
            point
        })
        .collect()
}

/// Offset of `zone` at `at`, in minutes west of UTC (positive behind UTC).
fn offset_minutes_west<Z: TimeZone>(zone: &Z, at: &DateTime<Utc>) -> i64 {
    let east_seconds = zone.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc();
    -i64::from(east_seconds / 60)
}

/// Converts and labels timestamps relative to a given local zone.
#[derive(Debug, Clone)]
pub struct TimeNormalizer<Z: TimeZone> {
    local: Z,
    strategy: OffsetStrategy,
}

impl TimeNormalizer<Local> {
    /// Normalizer for the zone of the running process.
    pub fn system() -> Self {
        Self::new(Local)
    }
}

impl<Z> TimeNormalizer<Z>
where
    Z: TimeZone,
    Z::Offset: Display,
{
    pub fn new(local: Z) -> Self {
        Self {
            local,
            strategy: OffsetStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: OffsetStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> OffsetStrategy {
        self.strategy
    }

    /// Shift that makes a local rendering of an instant read as `tz`'s wall clock.
    pub fn offset_millis(&self, tz: &Tz, at: &DateTime<Utc>) -> i64 {
        (offset_minutes_west(&self.local, at) - offset_minutes_west(tz, at)) * 60_000
    }

    /// Whether `tz` currently has the same offset as the local zone.
    pub fn offset_matches_local(&self, tz: &Tz, now: &DateTime<Utc>) -> bool {
        offset_minutes_west(&self.local, now) == offset_minutes_west(tz, now)
    }

    pub fn change_timezone(&self, points: Vec<DataPoint>, tz: &Tz, now: &DateTime<Utc>) -> Vec<DataPoint> {
        match self.strategy {
            OffsetStrategy::CurrentMoment => {
                let offset = self.offset_millis(tz, now);
                debug!(tz = %tz, offset_millis = offset, "shifting points");
                points
                    .into_iter()
                    .map(|mut point| {
                        point.date = point.timestamp.checked_add(offset).and_then(instant);
                        point
                    })
                    .collect()
            }
            OffsetStrategy::PerPoint => points
                .into_iter()
                .map(|mut point| {
                    point.date = instant(point.timestamp).and_then(|at| {
                        point
                            .timestamp
                            .checked_add(self.offset_millis(tz, &at))
                            .and_then(instant)
                    });
                    point
                })
                .collect(),
        }
    }

    /// Derives display dates: plain conversion without a target zone (or
    /// when the target zone already matches local), shifted otherwise.
    pub fn normalize(&self, points: Vec<DataPoint>, tz: Option<&str>, now: &DateTime<Utc>) -> Result<Vec<DataPoint>> {
        let Some(tz) = tz.filter(|tz| !tz.is_empty()) else {
            return Ok(convert_timestamps(points));
        };
        let tz = parse_timezone(tz)?;
        if self.strategy == OffsetStrategy::CurrentMoment && self.offset_matches_local(&tz, now) {
            return Ok(convert_timestamps(points));
        }
        Ok(self.change_timezone(points, &tz, now))
    }

    /// Human-readable label for the displayed window. Without an absolute
    /// window the range is taken to end at `now`.
    pub fn range_detail(&self, config: &QueryConfig, now: &DateTime<Utc>) -> Result<String> {
        let (start, end) = config.absolute_window().unwrap_or_else(|| {
            let end = now.timestamp_millis();
            (end - config.range.millis(), end)
        });
        let start = instant(start)
            .ok_or_else(|| ConsoleError::Internal(format!("timestamp out of range: {}", start)))?;
        let end = instant(end)
            .ok_or_else(|| ConsoleError::Internal(format!("timestamp out of range: {}", end)))?;

        match config.tz.as_deref().filter(|tz| !tz.is_empty()) {
            Some(tz) => {
                let tz = parse_timezone(tz)?;
                Ok(format!(
                    "{} - {}",
                    start.with_timezone(&tz).format(DETAIL_FORMAT),
                    end.with_timezone(&tz).format(DETAIL_FORMAT_ZONED)
                ))
            }
            None => Ok(format!(
                "{} - {}",
                start.with_timezone(&self.local).format(DETAIL_FORMAT),
                end.with_timezone(&self.local).format(DETAIL_FORMAT)
            )),
        }
    }
}

/// Shift `points` into `tz` relative to the process's local zone, now.
pub fn change_timezone(points: Vec<DataPoint>, tz: &str) -> Result<Vec<DataPoint>> {
    let tz = parse_timezone(tz)?;
    Ok(TimeNormalizer::system().change_timezone(points, &tz, &Utc::now()))
}

pub fn offset_matches_local(tz: &str) -> Result<bool> {
    let tz = parse_timezone(tz)?;
    Ok(TimeNormalizer::system().offset_matches_local(&tz, &Utc::now()))
}

pub fn range_detail(config: &QueryConfig) -> Result<String> {
    TimeNormalizer::system().range_detail(config, &Utc::now())
}
