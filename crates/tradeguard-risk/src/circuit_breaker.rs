//! CircuitBreakerManager: system-wide veto gate.
//!
//! Owns the six breakers and applies their state transitions through
//! [`BreakerStore::update`]. Within a process every read-modify-write also
//! runs under one transition lock, so concurrent trips never lose an
//! increment.
//!
//! Thread-safe: can be shared across threads via `Arc<CircuitBreakerManager>`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use tradeguard_core::Clock;
use tradeguard_telemetry::Metrics;

use crate::breaker::{BreakerConfig, BreakerStatus, BreakerType, CircuitBreakerState};
use crate::error::RiskResult;
use crate::store::{BreakerStore, InMemoryBreakerStore};

pub struct CircuitBreakerManager {
    config: BreakerConfig,
    store: Arc<dyn BreakerStore>,
    clock: Arc<dyn Clock>,
    /// Serialises read-modify-write cycles against the store.
    transition_lock: Mutex<()>,
}

impl CircuitBreakerManager {
    /// Create a manager over `store`.
    ///
    /// Breakers missing from the store are created `Closed`. Breakers already
    /// in the store keep their status, with `probes_required` refreshed from
    /// `config`.
    pub fn new(
        config: BreakerConfig,
        store: Arc<dyn BreakerStore>,
        clock: Arc<dyn Clock>,
    ) -> RiskResult<Self> {
        let manager = Self {
            config,
            store,
            clock,
            transition_lock: Mutex::new(()),
        };
        manager.seed()?;
        Ok(manager)
    }

    /// Manager over a fresh [`InMemoryBreakerStore`].
    pub fn in_memory(config: BreakerConfig, clock: Arc<dyn Clock>) -> RiskResult<Self> {
        Self::new(config, Arc::new(InMemoryBreakerStore::new()), clock)
    }

    fn seed(&self) -> RiskResult<()> {
        let _guard = self.transition_lock.lock();
        for breaker in BreakerType::ALL {
            let probes_required = self.config.settings(breaker).probes_required;
            let state = self.store.update(breaker, &mut |current| match current {
                Some(existing) => CircuitBreakerState {
                    probes_required,
                    ..existing
                },
                None => CircuitBreakerState::new(breaker, probes_required),
            })?;
            Metrics::breaker_status(breaker.as_str(), state.status.as_gauge());
        }
        Ok(())
    }

    /// Trip a breaker. Refreshes the cooldown if it is already open.
    pub fn trip(&self, breaker: BreakerType, reason: &str) -> RiskResult<CircuitBreakerState> {
        let cooldown = self.config.settings(breaker).cooldown;
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();

        let state = self
            .apply(breaker, now, |s| s.tripped(reason, now, cooldown))?
            .state;

        Metrics::breaker_tripped(breaker.as_str());
        error!(
            breaker = %breaker,
            reason,
            trip_count = state.trip_count,
            cooldown_until = ?state.cooldown_until,
            "CIRCUIT BREAKER TRIPPED"
        );
        Ok(state)
    }

    /// Manual override back to `Closed` from any state.
    ///
    /// `trip_count` is preserved for the audit trail.
    pub fn reset(&self, breaker: BreakerType) -> RiskResult<CircuitBreakerState> {
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();

        let Transition { prior, state } = self.apply(breaker, now, CircuitBreakerState::reset)?;

        info!(
            breaker = %breaker,
            previous_status = %prior,
            trip_count = state.trip_count,
            "Circuit breaker manually reset"
        );
        Ok(state)
    }

    /// Record a successful probe. Returns `true` if the breaker is now closed.
    ///
    /// Has no effect unless the breaker is half-open.
    pub fn record_probe_success(&self, breaker: BreakerType) -> RiskResult<bool> {
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();

        let Transition { prior, state } =
            self.apply(breaker, now, CircuitBreakerState::probe_succeeded)?;

        if prior == BreakerStatus::HalfOpen {
            Metrics::breaker_probe(breaker.as_str(), true);
            if state.is_closed() {
                info!(breaker = %breaker, "Circuit breaker recovered after probes");
            } else {
                debug!(
                    breaker = %breaker,
                    probe_successes = state.probe_successes,
                    probes_required = state.probes_required,
                    "Probe succeeded"
                );
            }
        }

        Ok(state.is_closed())
    }

    /// Record a failed probe. A half-open breaker re-opens with a fresh
    /// cooldown and its probe count reset to zero.
    pub fn record_probe_failure(
        &self,
        breaker: BreakerType,
        reason: &str,
    ) -> RiskResult<CircuitBreakerState> {
        let cooldown = self.config.settings(breaker).cooldown;
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();

        let Transition { prior, state } =
            self.apply(breaker, now, |s| s.probe_failed(reason, now, cooldown))?;

        if prior == BreakerStatus::HalfOpen {
            Metrics::breaker_probe(breaker.as_str(), false);
            Metrics::breaker_tripped(breaker.as_str());
            warn!(
                breaker = %breaker,
                reason,
                trip_count = state.trip_count,
                "Probe failed, circuit breaker re-opened"
            );
        }

        Ok(state)
    }

    /// Current status of one breaker, applying the lazy cooldown transition.
    pub fn check_breaker(&self, breaker: BreakerType) -> RiskResult<BreakerStatus> {
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();
        Ok(self.apply(breaker, now, |s| s)?.state.status)
    }

    /// `true` only if every breaker is `Closed`.
    ///
    /// Half-open breakers are not clear. A store failure is treated as not
    /// clear.
    pub fn all_clear(&self) -> bool {
        match self.evaluate_all() {
            Ok(states) => states.iter().all(CircuitBreakerState::is_closed),
            Err(e) => {
                error!(error = %e, "Breaker store unavailable, treating as not clear");
                false
            }
        }
    }

    /// Snapshot of every breaker, as seen at the current time.
    pub fn all_states(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        let now = self.clock.now();
        Ok(self
            .store
            .get_all()?
            .into_iter()
            .map(|s| s.evaluated(now))
            .collect())
    }

    /// Breakers that are not `Closed`.
    pub fn tripped_breakers(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        Ok(self
            .all_states()?
            .into_iter()
            .filter(|s| !s.is_closed())
            .collect())
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn evaluate_all(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        let _guard = self.transition_lock.lock();
        let now = self.clock.now();
        BreakerType::ALL
            .into_iter()
            .map(|breaker| self.apply(breaker, now, |s| s).map(|t| t.state))
            .collect()
    }

    /// Apply the lazy cooldown transition and `event` to the stored state in
    /// one store update. Caller must hold `transition_lock`.
    fn apply<F>(&self, breaker: BreakerType, now: DateTime<Utc>, event: F) -> RiskResult<Transition>
    where
        F: Fn(CircuitBreakerState) -> CircuitBreakerState,
    {
        let probes_required = self.config.settings(breaker).probes_required;
        // (stored, after cooldown) statuses seen by the last run of the update
        let mut seen = None;

        let state = self.store.update(breaker, &mut |current| {
            let stored =
                current.unwrap_or_else(|| CircuitBreakerState::new(breaker, probes_required));
            let evaluated = stored.clone().evaluated(now);
            seen = Some((stored.status, evaluated.status));
            event(evaluated)
        })?;

        let (stored, prior) = seen.unwrap_or((state.status, state.status));
        if prior != stored {
            info!(
                breaker = %breaker,
                "Cooldown elapsed, circuit breaker half-open"
            );
        }
        if state.status != stored {
            Metrics::breaker_status(breaker.as_str(), state.status.as_gauge());
        }

        Ok(Transition { prior, state })
    }
}

/// Outcome of one [`CircuitBreakerManager::apply`] call.
struct Transition {
    /// Status after the cooldown check, before the event was applied.
    prior: BreakerStatus,
    state: CircuitBreakerState,
}

impl std::fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
