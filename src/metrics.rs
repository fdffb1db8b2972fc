use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::time::Instant;

use crate::{ConsoleError, Result};

lazy_static! {
    // Request metrics
    pub static ref REQUEST_COUNTER: IntCounterVec = register_int_counter_vec!(
        "console_requests_total",
        "Total number of requests issued to the metrics API",
        &["endpoint"]
    ).expect("console_requests_total registers once");

    pub static ref REQUEST_FAILURES: IntCounterVec = register_int_counter_vec!(
        "console_request_failures_total",
        "Requests that failed or returned a non-success status",
        &["endpoint"]
    ).expect("console_request_failures_total registers once");

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "console_request_duration_seconds",
        "Request duration in seconds",
        &["endpoint"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
    ).expect("console_request_duration_seconds registers once");

    // Rendering metrics
    pub static ref POINTS_NORMALIZED: IntCounter = register_int_counter!(
        "console_points_normalized_total",
        "Data points given a display date"
    ).expect("console_points_normalized_total registers once");

    pub static ref SEARCHES_SUPERSEDED: IntCounter = register_int_counter!(
        "console_searches_superseded_total",
        "Pending metric searches replaced by newer input before firing"
    ).expect("console_searches_superseded_total registers once");
}

/// Counts a request on creation and records its duration when dropped.
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        REQUEST_COUNTER.with_label_values(&[endpoint]).inc();
        Self {
            endpoint,
            start: Instant::now(),
        }
    }

    pub fn fail(&self) {
        REQUEST_FAILURES.with_label_values(&[self.endpoint]).inc();
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        REQUEST_DURATION
            .with_label_values(&[self.endpoint])
            .observe(duration);
    }
}

pub fn record_points_normalized(count: usize) {
    POINTS_NORMALIZED.inc_by(count as u64);
}

pub fn record_search_superseded() {
    SEARCHES_SUPERSEDED.inc();
}

/// Current values of the default registry in the text exposition format.
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| ConsoleError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| ConsoleError::Internal(e.to_string()))
}
