//! Text the chart collaborator needs alongside the data.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::DataPoint;
use crate::query::QueryConfig;
use crate::range::{Range, RateUnit};

pub const HOVER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn sample_plural(samples: u64) -> String {
    match samples {
        0 => "No Samples".to_string(),
        1 => "1 Sample".to_string(),
        n => format!("{} Samples", n),
    }
}

/// Y-axis label for rate fields. Unset means per second.
pub fn rate_unit_label(rate_unit: Option<RateUnit>) -> &'static str {
    rate_unit.unwrap_or_default().label()
}

/// strftime pattern for x-axis ticks.
pub fn axis_format(range: Range) -> &'static str {
    match range {
        Range::Minute | Range::Hour | Range::Day => "%H:%M",
        Range::Week | Range::Month | Range::Year => "%x",
    }
}

/// Hover timestamp pattern; with a target zone the zone's current offset
/// and abbreviation are baked into the pattern.
pub fn hover_format(tz: Option<&Tz>, now: &DateTime<Utc>) -> String {
    match tz {
        Some(tz) => format!("{} {}", HOVER_FORMAT, now.with_timezone(tz).format("%:z %Z")),
        None => HOVER_FORMAT.to_string(),
    }
}

/// Label following the value in hover text: the rate unit for `*Rate`
/// fields when one is configured, otherwise the y label.
pub fn hover_label<'a>(field: &str, y_label: &'a str, rate_unit: Option<RateUnit>) -> &'a str {
    match rate_unit {
        Some(unit) if field.ends_with("Rate") => unit.label(),
        _ => y_label,
    }
}

/// The readout shown for a hovered point, e.g.
/// `12.500 Per Minute 2024-03-01 10:00:00  (5 Samples)`.
///
/// `date` is rendered as-is; callers pass points already normalized.
pub fn hover_text(point: &DataPoint, field: &str, y_label: &str, rate_unit: Option<RateUnit>, format: &str) -> String {
    let value = point.value(field).unwrap_or(0.0);
    let date = point
        .date
        .map(|date| date.format(format).to_string())
        .unwrap_or_default();
    format!(
        "{:.3} {} {}  ({})",
        value,
        hover_label(field, y_label, rate_unit),
        date,
        sample_plural(point.samples)
    )
}

/// Page title: the app, or `app » host`.
pub fn app_title(config: &QueryConfig) -> String {
    match config.host.as_deref().filter(|host| !host.is_empty()) {
        Some(host) => format!("{} \u{bb} {}", config.app, host),
        None => config.app.clone(),
    }
}
