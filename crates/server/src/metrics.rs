//! Prometheus metrics for observability.
//!
//! - HTTP request metrics (latency, counts, in flight)
//! - Admin authentication failures
//! - Round, ticket and draw counters
//! - Current round state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use lotto_core::RoundStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "lotto_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("lotto_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "lotto_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Admin authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("lotto_auth_failures_total", "Total authentication failures"),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Lottery Metrics
// =============================================================================

pub static ROUNDS_OPENED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("lotto_rounds_opened_total", "Rounds opened since startup").unwrap()
});

pub static ROUNDS_CLOSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("lotto_rounds_closed_total", "Rounds closed since startup").unwrap()
});

/// Tickets stored and answered with a QR code.
pub static TICKETS_ISSUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("lotto_tickets_issued_total", "Tickets issued since startup").unwrap()
});

/// Rejected submissions by error code.
pub static TICKET_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lotto_ticket_rejections_total",
            "Ticket submissions rejected",
        ),
        &["reason"],
    )
    .unwrap()
});

pub static DRAWS_PUBLISHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("lotto_draws_published_total", "Draws published since startup").unwrap()
});

// =============================================================================
// Round State (collected dynamically)
// =============================================================================

/// 1 while a round accepts tickets.
pub static ROUND_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "lotto_round_open",
        "Whether a round is open for submissions (1) or not (0)",
    )
    .unwrap()
});

/// Tickets in the most recent round.
pub static LATEST_ROUND_TICKETS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "lotto_latest_round_tickets",
        "Number of tickets in the most recent round",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Lottery
    registry
        .register(Box::new(ROUNDS_OPENED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(ROUNDS_CLOSED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TICKETS_ISSUED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TICKET_REJECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(DRAWS_PUBLISHED_TOTAL.clone()))
        .unwrap();

    // Round state
    registry.register(Box::new(ROUND_OPEN.clone())).unwrap();
    registry
        .register(Box::new(LATEST_ROUND_TICKETS.clone()))
        .unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh round gauges from the database before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.lottery().latest_round() {
        Ok(Some(summary)) => {
            ROUND_OPEN.set(i64::from(summary.round.status == RoundStatus::Open));
            LATEST_ROUND_TICKETS.set(summary.ticket_count);
        }
        Ok(None) => {
            ROUND_OPEN.set(0);
            LATEST_ROUND_TICKETS.set(0);
        }
        Err(e) => tracing::warn!(error = %e, "Failed to collect round metrics"),
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Used when no route matched; matched requests are labelled with the route template.
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
