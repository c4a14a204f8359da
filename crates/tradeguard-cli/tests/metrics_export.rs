//! Metrics export from a fresh process.
//!
//! Kept in its own test binary: the Prometheus registry is process-global.

use std::sync::Arc;

use rust_decimal_macros::dec;
use tempfile::TempDir;
use tradeguard_cli::{AppConfig, Application, StoreConfig, StoreKind};
use tradeguard_core::{ManualClock, RiskLimits};
use tradeguard_risk::BreakerType;

const START_MS: i64 = 1_700_000_000_000;

fn gauge_line(text: &str, breaker: BreakerType) -> Option<String> {
    let prefix = format!("tradeguard_breaker_status{{breaker=\"{breaker}\"}} ");
    text.lines()
        .find(|line| line.starts_with(&prefix))
        .map(str::to_string)
}

#[test]
fn test_metrics_report_breaker_states_from_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = AppConfig::with_limits(RiskLimits::new(dec!(10000)));
    config.store = StoreConfig {
        kind: StoreKind::File,
        path: temp_dir.path().join("breakers.json"),
    };
    let clock = Arc::new(ManualClock::at_millis(START_MS));

    let writer = Application::with_clock(config.clone(), clock.clone()).unwrap();
    // A second process, started before the trip, exports metrics after it.
    let exporter = Application::with_clock(config, clock.clone()).unwrap();

    writer
        .trip(BreakerType::FlashCrash, "ETH -15% in 60s")
        .unwrap();
    writer
        .trip(BreakerType::OracleStale, "oracle 120s old")
        .unwrap();
    clock.advance(BreakerType::OracleStale.default_cooldown());
    // Both applications share one registry here; leave a stale gauge behind.
    tradeguard_telemetry::Metrics::breaker_status(BreakerType::FlashCrash.as_str(), 0);

    let text = exporter.metrics_text().unwrap();

    assert_eq!(
        gauge_line(&text, BreakerType::FlashCrash).as_deref(),
        Some("tradeguard_breaker_status{breaker=\"FLASH_CRASH\"} 2")
    );
    // Cooldown elapsed: reported half-open even though nothing rewrote the file.
    assert_eq!(
        gauge_line(&text, BreakerType::OracleStale).as_deref(),
        Some("tradeguard_breaker_status{breaker=\"ORACLE_STALE\"} 1")
    );
    assert_eq!(
        gauge_line(&text, BreakerType::GasSpike).as_deref(),
        Some("tradeguard_breaker_status{breaker=\"GAS_SPIKE\"} 0")
    );
}
