//! Prometheus metrics for tradeguard.
//!
//! Covers:
//! - Risk decisions and their scores
//! - Failed pre-flight checks
//! - Circuit breaker trips, probes and status
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a fatal configuration error that should
//! crash on first use rather than fail silently.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_gauge_vec, CounterVec, Encoder,
    Histogram, IntGaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Total risk decisions.
/// Labels: outcome (allowed/denied/breaker_veto)
pub static DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradeguard_decisions_total",
        "Total risk decisions by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Risk score distribution of evaluated actions.
pub static RISK_SCORE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "tradeguard_risk_score",
        "Risk score of evaluated actions (0-100)",
        vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    )
    .unwrap()
});

/// Failed pre-flight checks.
pub static CHECK_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradeguard_check_failed_total",
        "Total failed pre-flight checks",
        &["check"]
    )
    .unwrap()
});

/// Pre-flight warnings (passed but near the limit).
pub static CHECK_WARNING_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradeguard_check_warning_total",
        "Total pre-flight near-limit warnings",
        &["check"]
    )
    .unwrap()
});

/// Circuit breaker trips.
pub static BREAKER_TRIPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradeguard_breaker_trips_total",
        "Total circuit breaker trips",
        &["breaker"]
    )
    .unwrap()
});

/// Circuit breaker probe outcomes.
/// Labels: breaker, result (success/failure)
pub static BREAKER_PROBES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tradeguard_breaker_probes_total",
        "Total half-open probe outcomes",
        &["breaker", "result"]
    )
    .unwrap()
});

/// Circuit breaker status (0 = closed, 1 = half-open, 2 = open).
pub static BREAKER_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "tradeguard_breaker_status",
        "Circuit breaker status (0=closed, 1=half_open, 2=open)",
        &["breaker"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record a decision outcome with its score.
    pub fn decision(outcome: &str, risk_score: u32) {
        DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
        RISK_SCORE.observe(f64::from(risk_score));
    }

    /// Record a failed pre-flight check.
    pub fn check_failed(check: &str) {
        CHECK_FAILED_TOTAL.with_label_values(&[check]).inc();
    }

    /// Record a near-limit warning.
    pub fn check_warning(check: &str) {
        CHECK_WARNING_TOTAL.with_label_values(&[check]).inc();
    }

    /// Record a breaker trip.
    pub fn breaker_tripped(breaker: &str) {
        BREAKER_TRIPS_TOTAL.with_label_values(&[breaker]).inc();
    }

    /// Record a half-open probe outcome.
    pub fn breaker_probe(breaker: &str, success: bool) {
        let result = if success { "success" } else { "failure" };
        BREAKER_PROBES_TOTAL
            .with_label_values(&[breaker, result])
            .inc();
    }

    /// Set breaker status gauge.
    pub fn breaker_status(breaker: &str, status: i64) {
        BREAKER_STATUS.with_label_values(&[breaker]).set(status);
    }

    /// Render the default registry in Prometheus text exposition format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_counter_increments() {
        let before = DECISIONS_TOTAL.with_label_values(&["allowed"]).get();
        Metrics::decision("allowed", 0);
        let after = DECISIONS_TOTAL.with_label_values(&["allowed"]).get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_breaker_status_gauge() {
        Metrics::breaker_status("TEST_BREAKER", 2);
        assert_eq!(BREAKER_STATUS.with_label_values(&["TEST_BREAKER"]).get(), 2);
        Metrics::breaker_status("TEST_BREAKER", 0);
        assert_eq!(BREAKER_STATUS.with_label_values(&["TEST_BREAKER"]).get(), 0);
    }

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        Metrics::breaker_tripped("TEST_GATHER");
        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("tradeguard_breaker_trips_total"));
    }
}
