//! RiskManager: single entry point for risk gating.
//!
//! Breakers are consulted first. If any breaker is not closed the action is
//! vetoed without running pre-flight checks. Otherwise the pre-flight
//! validator decides against the current limits snapshot.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};
use tradeguard_core::{ActionParams, PortfolioSnapshot, RiskDecision, RiskLimits};
use tradeguard_telemetry::Metrics;

use crate::analytics::{self, PortfolioRiskStats};
use crate::breaker::{BreakerStatus, BreakerType, CircuitBreakerState};
use crate::circuit_breaker::CircuitBreakerManager;
use crate::error::RiskResult;
use crate::preflight::PreFlightValidator;

/// Reason reported when a breaker vetoes an action.
pub const BREAKER_VETO_REASON: &str = "circuit breaker open";

#[derive(Debug)]
pub struct RiskManager {
    breakers: CircuitBreakerManager,
    validator: PreFlightValidator,
    limits: RwLock<Arc<RiskLimits>>,
}

impl RiskManager {
    /// Create a manager. Fails with `RiskError::Config` on invalid limits.
    pub fn new(limits: RiskLimits, breakers: CircuitBreakerManager) -> RiskResult<Self> {
        let limits = limits.validated()?;
        Ok(Self {
            breakers,
            validator: PreFlightValidator::new(),
            limits: RwLock::new(Arc::new(limits)),
        })
    }

    /// Decide whether `action` may execute against `portfolio`.
    pub fn validate_action(
        &self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
    ) -> RiskResult<RiskDecision> {
        if !self.breakers.all_clear() {
            let decision = self.breaker_veto();
            Metrics::decision("breaker_veto", decision.risk_score);
            warn!(warnings = ?decision.warnings, "Action vetoed by circuit breaker");
            return Ok(decision);
        }

        let limits = self.limits();
        let report = self.validator.evaluate(action, portfolio, &limits)?;

        for outcome in &report.outcomes {
            if outcome.is_fail() {
                Metrics::check_failed(outcome.check.name());
            }
            if outcome.warning.is_some() {
                Metrics::check_warning(outcome.check.name());
            }
        }

        let decision = report.decision;
        let outcome = if decision.allowed { "allowed" } else { "denied" };
        Metrics::decision(outcome, decision.risk_score);

        if decision.allowed {
            debug!(
                trade_value_usd = %action.trade_value_usd,
                risk_score = decision.risk_score,
                warnings = decision.warnings.len(),
                "Action allowed"
            );
        } else {
            info!(
                trade_value_usd = %action.trade_value_usd,
                risk_score = decision.risk_score,
                reason = %decision.reason,
                "Action denied"
            );
        }

        Ok(decision)
    }

    fn breaker_veto(&self) -> RiskDecision {
        let warnings = match self.breakers.tripped_breakers() {
            Ok(states) => states
                .iter()
                .map(|s| format!("{}: {}", s.breaker_type, s.status))
                .collect(),
            Err(e) => vec![format!("breaker store unavailable: {e}")],
        };
        RiskDecision::denied(RiskDecision::MAX_SCORE, BREAKER_VETO_REASON).with_warnings(warnings)
    }

    pub fn trip_breaker(
        &self,
        breaker: BreakerType,
        reason: &str,
    ) -> RiskResult<CircuitBreakerState> {
        self.breakers.trip(breaker, reason)
    }

    pub fn reset_breaker(&self, breaker: BreakerType) -> RiskResult<CircuitBreakerState> {
        self.breakers.reset(breaker)
    }

    pub fn record_probe_success(&self, breaker: BreakerType) -> RiskResult<bool> {
        self.breakers.record_probe_success(breaker)
    }

    pub fn record_probe_failure(
        &self,
        breaker: BreakerType,
        reason: &str,
    ) -> RiskResult<CircuitBreakerState> {
        self.breakers.record_probe_failure(breaker, reason)
    }

    pub fn check_breaker(&self, breaker: BreakerType) -> RiskResult<BreakerStatus> {
        self.breakers.check_breaker(breaker)
    }

    pub fn breaker_states(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        self.breakers.all_states()
    }

    pub fn tripped_breakers(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        self.breakers.tripped_breakers()
    }

    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.breakers
    }

    /// Replace the limits. Validated before the swap; on error the previous
    /// limits stay in force.
    pub fn set_limits(&self, limits: RiskLimits) -> RiskResult<()> {
        let limits = limits.validated()?;
        *self.limits.write() = Arc::new(limits);
        info!("Risk limits updated");
        Ok(())
    }

    /// Snapshot of the limits in force.
    pub fn limits(&self) -> Arc<RiskLimits> {
        Arc::clone(&self.limits.read())
    }

    /// Portfolio statistics, with the drawdown component scaled by the
    /// configured `max_drawdown_pct`.
    pub fn portfolio_risk(
        &self,
        equity_curve: &[f64],
        position_weights: &[f64],
    ) -> RiskResult<PortfolioRiskStats> {
        let drawdown_limit_pct = self.limits().max_drawdown_pct.to_f64().unwrap_or(0.0);
        analytics::portfolio_risk(equity_curve, position_weights, drawdown_limit_pct)
    }
}
