//! Core domain types for the tradeguard risk-gating core.
//!
//! This crate provides the values exchanged with the agent layer:
//! - `RiskLimits`: Validated risk configuration
//! - `ActionParams`, `PortfolioSnapshot`: Per-call inputs
//! - `RiskDecision`: The allow/deny verdict
//! - `Clock`: Injected time source

pub mod clock;
pub mod error;
pub mod limits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use limits::RiskLimits;
pub use types::{
    ActionParams, PortfolioSnapshot, RiskDecision, MOD_SLIPPAGE_BPS, MOD_TRADE_VALUE_USD,
};
