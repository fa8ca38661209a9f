//! Feed Ranking Metrics
//!
//! Prometheus metrics for the feed endpoints and the signal refresher.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_requests_total",
        "Total feed requests by endpoint and status",
        &["endpoint", "status"]
    )
    .expect("Failed to register feed requests metric")
});

static FEED_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_request_duration_seconds",
        "Duration of feed computations",
        &["endpoint"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register feed duration metric")
});

static FEED_ITEMS_RETURNED: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "feed_items_returned",
        "Number of items returned per feed page",
        &["endpoint"],
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .expect("Failed to register feed items metric")
});

static SIGNAL_REFRESHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "signal_refreshes_total",
        "Signal refresh attempts by outcome (refreshed/cooldown/error)",
        &["outcome"]
    )
    .expect("Failed to register signal refresh metric")
});

/// Record one feed request result.
pub fn record_feed_request(endpoint: &str, status: &str) {
    FEED_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
}

/// Record feed computation duration.
pub fn record_feed_duration(endpoint: &str, duration: Duration) {
    FEED_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(duration.as_secs_f64());
}

/// Record page size actually returned.
pub fn record_items_returned(endpoint: &str, count: usize) {
    FEED_ITEMS_RETURNED
        .with_label_values(&[endpoint])
        .observe(count as f64);
}

/// Record a signal refresh attempt.
pub fn record_signal_refresh(outcome: &str) {
    SIGNAL_REFRESHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
