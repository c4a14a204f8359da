//! Prometheus metrics and structured logging for tradeguard.
//!
//! Provides observability for the risk-gating core:
//! - Prometheus metrics for decisions, failed checks and breaker transitions
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
