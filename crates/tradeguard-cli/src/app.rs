//! Application: builds the risk manager from configuration and runs
//! operator commands against it.

use std::sync::Arc;

use tracing::{info, warn};
use tradeguard_core::{ActionParams, Clock, PortfolioSnapshot, RiskDecision, SystemClock};
use tradeguard_persistence::{DecisionJournal, FileBreakerStore};
use tradeguard_risk::{
    BreakerStore, BreakerType, CircuitBreakerManager, CircuitBreakerState, InMemoryBreakerStore,
    PortfolioRiskStats, RiskError, RiskManager,
};
use tradeguard_telemetry::Metrics;

use crate::config::{AppConfig, StoreKind};
use crate::error::AppResult;

pub struct Application {
    config: AppConfig,
    risk: RiskManager,
    journal: Option<DecisionJournal>,
}

impl Application {
    /// Create the application on the system clock.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create the application with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        config.validate()?;

        let store: Arc<dyn BreakerStore> = match config.store.kind {
            StoreKind::Memory => Arc::new(InMemoryBreakerStore::new()),
            StoreKind::File => Arc::new(FileBreakerStore::open(&config.store.path)?),
        };
        let breakers = CircuitBreakerManager::new(config.breaker_config()?, store, clock.clone())?;
        let risk = RiskManager::new(config.limits.clone(), breakers)?;

        let journal = if config.journal.enabled {
            Some(DecisionJournal::new(
                &config.journal.dir,
                config.journal.buffer_size,
                clock,
            )?)
        } else {
            None
        };

        info!(
            store = ?config.store.kind,
            journal = config.journal.enabled,
            "Application initialized"
        );

        Ok(Self {
            config,
            risk,
            journal,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    /// Validate an action and journal the decision.
    ///
    /// A journal failure is logged; it never changes the decision.
    pub fn check(
        &mut self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
    ) -> AppResult<RiskDecision> {
        let decision = self.risk.validate_action(action, portfolio)?;

        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record(action, portfolio, &decision) {
                warn!(error = %e, "Failed to journal decision");
            }
        }

        Ok(decision)
    }

    pub fn analyze(
        &self,
        equity_curve: &[f64],
        position_weights: &[f64],
    ) -> AppResult<PortfolioRiskStats> {
        Ok(self.risk.portfolio_risk(equity_curve, position_weights)?)
    }

    pub fn breakers(&self) -> AppResult<Vec<CircuitBreakerState>> {
        Ok(self.risk.breaker_states()?)
    }

    pub fn trip(&self, breaker: BreakerType, reason: &str) -> AppResult<CircuitBreakerState> {
        Ok(self.risk.trip_breaker(breaker, reason)?)
    }

    pub fn reset(&self, breaker: BreakerType) -> AppResult<CircuitBreakerState> {
        Ok(self.risk.reset_breaker(breaker)?)
    }

    /// Record a probe outcome and return the breaker's resulting state.
    pub fn probe(
        &self,
        breaker: BreakerType,
        success: bool,
        reason: &str,
    ) -> AppResult<CircuitBreakerState> {
        if success {
            self.risk.record_probe_success(breaker)?;
            self.state_of(breaker)
        } else {
            Ok(self.risk.record_probe_failure(breaker, reason)?)
        }
    }

    fn state_of(&self, breaker: BreakerType) -> AppResult<CircuitBreakerState> {
        self.breakers()?
            .into_iter()
            .find(|s| s.breaker_type == breaker)
            .ok_or_else(|| RiskError::Store(format!("no state stored for {breaker}")).into())
    }

    /// Prometheus text exposition.
    ///
    /// Breaker status gauges are refreshed from the state store first, so a
    /// one-shot process reports the shared breaker state rather than its
    /// own startup values. Counters only cover this process.
    pub fn metrics_text(&self) -> AppResult<String> {
        for state in self.breakers()? {
            Metrics::breaker_status(state.breaker_type.as_str(), state.status.as_gauge());
        }
        Ok(Metrics::gather_text()?)
    }

    /// Flush and close the journal.
    pub fn close(&mut self) -> AppResult<()> {
        if let Some(journal) = self.journal.as_mut() {
            journal.close()?;
        }
        Ok(())
    }
}
