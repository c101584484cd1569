//! Prometheus metrics for the webhook
//!
//! Counters for webhook requests and provider mutations, plus the duration
//! of each applied change-set. Served as text from `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};
use tracing::error;

//==============================================================================
// Metrics
//==============================================================================

lazy_static! {
    /// Webhook requests by route and response status
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "clouddns_webhook_requests_total",
        "Total number of webhook requests",
        &["route", "status"]
    )
    .unwrap();

    /// Successful provider mutations
    pub static ref RECORD_CHANGES_TOTAL: CounterVec = register_counter_vec!(
        "clouddns_webhook_record_changes_total",
        "Total number of record changes applied to Cloud DNS",
        &["operation"]
    )
    .unwrap();

    /// Failed record changes
    pub static ref RECORD_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "clouddns_webhook_record_errors_total",
        "Total number of record changes that failed",
        &["operation"]
    )
    .unwrap();

    /// Session refresh attempts by outcome
    pub static ref TOKEN_REFRESHES_TOTAL: CounterVec = register_counter_vec!(
        "clouddns_webhook_token_refreshes_total",
        "Total number of identity token refreshes",
        &["outcome"]
    )
    .unwrap();

    /// Time spent applying one change-set
    pub static ref APPLY_DURATION_SECONDS: Histogram = register_histogram!(
        "clouddns_webhook_apply_duration_seconds",
        "Duration of applying a change-set in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]
    )
    .unwrap();
}

//==============================================================================
// Public Functions
//==============================================================================

/// Records a served webhook request
pub fn record_request(route: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[route, &status.to_string()])
        .inc();
}

/// Records a successful provider mutation
///
/// # Arguments
///
/// * `operation` - `create` or `delete`
pub fn record_change(operation: &str) {
    RECORD_CHANGES_TOTAL.with_label_values(&[operation]).inc();
}

/// Records a failed record change
///
/// # Arguments
///
/// * `operation` - `create`, `update` or `delete`
pub fn record_error(operation: &str) {
    RECORD_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

/// Records a session refresh attempt (`success` or `failure`)
pub fn record_token_refresh(outcome: &str) {
    TOKEN_REFRESHES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Starts a timer for one change-set; observed when dropped
pub fn start_apply_timer() -> HistogramTimer {
    APPLY_DURATION_SECONDS.start_timer()
}

/// Collects all metrics and returns them in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

//==============================================================================
// Types
//==============================================================================

/// Histogram timer for measuring duration
pub type HistogramTimer = prometheus::HistogramTimer;

//==============================================================================
// Tests
//==============================================================================
