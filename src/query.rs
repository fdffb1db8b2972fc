//! Endpoint construction for the metrics API and the console fragments.
//!
//! Only the metric name and the search prefix are URL-encoded; every other
//! value is passed to the server exactly as configured. Nothing here
//! validates: a malformed filter or host is the server's problem.

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::range::{Range, RateUnit};

/// Maximum number of points requested from the graph endpoint.
pub const GRAPH_LIMIT: u32 = 5000;

/// Everything needed to query and label one metric graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    pub index: String,
    pub app: String,
    #[serde(default)]
    pub host: Option<String>,
    pub name: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub range: Range,
    pub downsample_fn: String,
    #[serde(default)]
    pub rate_unit: Option<RateUnit>,
    #[serde(default)]
    pub start_timestamp: Option<i64>,
    #[serde(default)]
    pub end_timestamp: Option<i64>,
    #[serde(default)]
    pub tz: Option<String>,
    /// Opaque token forwarded to field-stats requests.
    #[serde(default)]
    pub t: Option<String>,
}

impl QueryConfig {
    pub fn new(index: impl Into<String>, app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            app: app.into(),
            host: None,
            name: name.into(),
            field: None,
            range: Range::default(),
            downsample_fn: "avg".to_string(),
            rate_unit: None,
            start_timestamp: None,
            end_timestamp: None,
            tz: None,
            t: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_downsample_fn(mut self, downsample_fn: impl Into<String>) -> Self {
        self.downsample_fn = downsample_fn.into();
        self
    }

    pub fn with_rate_unit(mut self, rate_unit: RateUnit) -> Self {
        self.rate_unit = Some(rate_unit);
        self
    }

    pub fn with_window(mut self, start: i64, end: i64) -> Self {
        self.start_timestamp = Some(start);
        self.end_timestamp = Some(end);
        self
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.tz = Some(tz.into());
        self
    }

    /// The explicit `[start, end]` window, present only when both ends are
    /// set and positive. When absent the server applies `range` relative to now.
    pub fn absolute_window(&self) -> Option<(i64, i64)> {
        match (self.start_timestamp, self.end_timestamp) {
            (Some(start), Some(end)) if start > 0 && end > 0 => Some((start, end)),
            _ => None,
        }
    }

    fn host_or_empty(&self) -> &str {
        self.host.as_deref().unwrap_or("")
    }

    fn range_component(&self) -> String {
        let mut component = format!("range={}", self.range);
        if let Some((start, end)) = self.absolute_window() {
            component.push_str(&format!("&rangeStart={}&rangeEnd={}", start, end));
        }
        component
    }
}

/// The metric-listing filter controls: type, activity and search prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFilter {
    pub type_filter: String,
    pub activity_filter: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl MetricsFilter {
    pub fn new(type_filter: impl Into<String>, activity_filter: impl Into<String>) -> Self {
        Self {
            type_filter: type_filter.into(),
            activity_filter: activity_filter.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Metric-listing fragment. `override_prefix` wins over the filter's own
/// prefix; `prefix` is only sent when the chosen value is non-empty.
pub fn metrics_endpoint(
    index: &str,
    app: &str,
    filter: &MetricsFilter,
    override_prefix: Option<&str>,
) -> String {
    let url = format!(
        "/console/{}/metrics/{}/{}?filter={}",
        index, app, filter.type_filter, filter.activity_filter
    );

    match override_prefix.or(filter.prefix.as_deref()) {
        Some(prefix) if !prefix.is_empty() => format!("{}&prefix={}", url, encode(prefix)),
        _ => url,
    }
}

/// Time-series JSON for one metric.
pub fn graph_endpoint(config: &QueryConfig) -> String {
    let mut url = format!(
        "/mgraph/{}/graph?emptyBins=false&aggregateOn=name&downsampleTo={}&downsampleFn={}&{}&limit={}&name={}&app={}&host={}",
        config.index,
        config.range.downsample_interval(),
        config.downsample_fn,
        config.range_component(),
        GRAPH_LIMIT,
        encode(&config.name),
        config.app,
        config.host_or_empty(),
    );
    if let Some(rate_unit) = config.rate_unit {
        url.push_str(&format!("&rateUnit={}", rate_unit));
    }
    url
}

/// Percentile histogram JSON for one metric, values in milliseconds.
pub fn histogram_endpoint(config: &QueryConfig) -> String {
    format!(
        "/mgraph/{}/histogram?{}&name={}&app={}&host={}&units=millis",
        config.index,
        config.range_component(),
        encode(&config.name),
        config.app,
        config.host_or_empty(),
    )
}

/// Field statistics fragment for the configured window.
pub fn field_stats_endpoint(config: &QueryConfig, field: &str) -> String {
    let mut url = format!(
        "/console/{}/fstats/{}?name={}&field={}&range={}",
        config.index, config.app, config.name, field, config.range
    );
    if let Some(host) = config.host.as_deref().filter(|h| !h.is_empty()) {
        url.push_str(&format!("&host={}", host));
    }
    if let Some(start) = config.start_timestamp.filter(|ts| *ts > 0) {
        url.push_str(&format!("&startTimestamp={}", start));
    }
    if let Some(end) = config.end_timestamp.filter(|ts| *ts > 0) {
        url.push_str(&format!("&endTimestamp={}", end));
    }
    if let Some(t) = config.t.as_deref().filter(|t| !t.is_empty()) {
        url.push_str(&format!("&t={}", t));
    }
    if let Some(rate_unit) = config.rate_unit {
        url.push_str(&format!("&rateUnit={}", rate_unit));
    }
    url
}

/// Field statistics for the stats dialog: an explicit range, no absolute window.
pub fn field_stats_dialog_endpoint(config: &QueryConfig, field: &str, range: Range) -> String {
    let mut url = format!(
        "/console/{}/fstats/{}?name={}&field={}&range={}",
        config.index, config.app, config.name, field, range
    );
    if let Some(host) = config.host.as_deref().filter(|h| !h.is_empty()) {
        url.push_str(&format!("&host={}", host));
    }
    if let Some(rate_unit) = config.rate_unit {
        url.push_str(&format!("&rateUnit={}", rate_unit));
    }
    url
}

/// The save-graph form fragment, prefilled from the current graph.
pub fn save_graph_form_endpoint(config: &QueryConfig, field: &str) -> String {
    let mut url = format!(
        "/console/{}/savegraph/{}?name={}&field={}&downsampleFn={}&{}",
        config.index,
        config.app,
        encode(&config.name),
        field,
        config.downsample_fn,
        config.range_component(),
    );
    if let Some(host) = config.host.as_deref().filter(|h| !h.is_empty()) {
        url.push_str(&format!("&host={}", host));
    }
    if let Some(rate_unit) = config.rate_unit {
        url.push_str(&format!("&rateUnit={}", rate_unit));
    }
    url
}

pub fn save_graph_endpoint(index: &str, app: &str) -> String {
    format!("/console/{}/savegraph/{}", index, app)
}

pub fn delete_graph_endpoint(index: &str, id: &str) -> String {
    format!("/console/{}/deletegraph/{}", index, id)
}

/// Where a saved graph can be viewed.
pub fn user_graph_location(index: &str, id: &str) -> String {
    format!("/console/{}/usergraph/{}", index, id.trim())
}

pub fn stats_endpoint(index: &str) -> String {
    format!("/console/{}/stats", index)
}

pub fn user_graphs_endpoint(index: &str) -> String {
    format!("/console/{}/usergraphs", index)
}

/// Shareable console link reproducing the current graph. Absent values are
/// rendered empty so the link always carries every parameter.
pub fn permalink(config: &QueryConfig) -> String {
    let ts = |v: Option<i64>| v.map(|ts| ts.to_string()).unwrap_or_default();
    format!(
        "/console/{}/graphs/{}?name={}&host={}&range={}&downsampleTo={}&downsampleFn={}&rangeStart={}&rangeEnd={}",
        config.index,
        config.app,
        encode(&config.name),
        config.host_or_empty(),
        config.range,
        config.range.downsample_interval(),
        config.downsample_fn,
        ts(config.start_timestamp),
        ts(config.end_timestamp),
    )
}
