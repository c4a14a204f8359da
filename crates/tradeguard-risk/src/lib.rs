//! Risk gating for autonomous trading agents.
//!
//! Every proposed action passes through two layers:
//! - Circuit breakers: six system-wide kill switches (Closed/Open/HalfOpen).
//!   Any breaker that is not closed vetoes the action outright.
//! - Pre-flight checks: seven weighted threshold checks that produce a
//!   0-100 risk score, warnings and suggested adjustments.
//!
//! Also provides:
//! - RiskManager: The single entry point combining both layers
//! - BreakerStore: Pluggable persistence for breaker state
//! - analytics: Drawdown, Sharpe, Sortino, VaR and concentration statistics

pub mod analytics;
pub mod breaker;
pub mod circuit_breaker;
pub mod error;
pub mod manager;
pub mod preflight;
pub mod store;

pub use analytics::PortfolioRiskStats;
pub use breaker::{
    BreakerConfig, BreakerOverride, BreakerSettings, BreakerStatus, BreakerType,
    CircuitBreakerState, MAX_COOLDOWN_MS,
};
pub use circuit_breaker::CircuitBreakerManager;
pub use error::{RiskError, RiskResult};
pub use manager::{RiskManager, BREAKER_VETO_REASON};
pub use preflight::{CheckOutcome, PreFlightCheck, PreFlightReport, PreFlightValidator};
pub use store::{BreakerStore, InMemoryBreakerStore};
