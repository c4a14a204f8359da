//! tradeguard operator application.
//!
//! Wires the risk-gating core to its ambient services:
//! - TOML configuration (limits, breaker overrides, store, journal)
//! - Breaker store selection (in-memory or file)
//! - Decision journaling

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, JournalConfig, StoreConfig, StoreKind};
pub use error::{AppError, AppResult};
