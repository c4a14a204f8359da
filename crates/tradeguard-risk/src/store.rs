//! Breaker state persistence.
//!
//! The manager reads and writes whole `CircuitBreakerState` values through
//! [`BreakerStore`]. Every transition goes through [`BreakerStore::update`],
//! so a store shared between processes can hold its own lock across the
//! read-modify-write. Within one process the manager serialises transitions.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::breaker::{BreakerType, CircuitBreakerState};
use crate::error::RiskResult;

/// Pluggable storage for breaker states.
pub trait BreakerStore: Send + Sync {
    /// State for one breaker, or `None` if never stored.
    fn get(&self, breaker: BreakerType) -> RiskResult<Option<CircuitBreakerState>>;

    /// Replace the state for `state.breaker_type`.
    fn set(&self, state: CircuitBreakerState) -> RiskResult<()>;

    /// Every stored state, in `BreakerType::ALL` order.
    fn get_all(&self) -> RiskResult<Vec<CircuitBreakerState>>;

    /// Read the state for `breaker`, pass it to `f` and store the result if
    /// it differs. Returns the state `f` produced.
    ///
    /// The default is a plain `get` then `set`. Stores that other processes
    /// can write must override it and keep the cycle atomic.
    fn update(
        &self,
        breaker: BreakerType,
        f: &mut dyn FnMut(Option<CircuitBreakerState>) -> CircuitBreakerState,
    ) -> RiskResult<CircuitBreakerState> {
        let current = self.get(breaker)?;
        let next = f(current.clone());
        if current.as_ref() != Some(&next) {
            self.set(next.clone())?;
        }
        Ok(next)
    }
}

/// Process-local, volatile breaker store.
///
/// State is lost on restart, which brings every breaker back `Closed`.
/// That is the intended recovery behavior for single-process deployments:
/// a restart is an operator action equivalent to a manual reset. Use a
/// persistent store when breakers must survive restarts.
#[derive(Debug, Default)]
pub struct InMemoryBreakerStore {
    states: RwLock<HashMap<BreakerType, CircuitBreakerState>>,
}

impl InMemoryBreakerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BreakerStore for InMemoryBreakerStore {
    fn get(&self, breaker: BreakerType) -> RiskResult<Option<CircuitBreakerState>> {
        Ok(self.states.read().get(&breaker).cloned())
    }

    fn set(&self, state: CircuitBreakerState) -> RiskResult<()> {
        self.states.write().insert(state.breaker_type, state);
        Ok(())
    }

    fn get_all(&self) -> RiskResult<Vec<CircuitBreakerState>> {
        let states = self.states.read();
        Ok(BreakerType::ALL
            .iter()
            .filter_map(|t| states.get(t).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerStatus;

    #[test]
    fn test_empty_store() {
        let store = InMemoryBreakerStore::new();
        assert!(store.get(BreakerType::GasSpike).unwrap().is_none());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let store = InMemoryBreakerStore::new();
        let mut state = CircuitBreakerState::new(BreakerType::GasSpike, 2);
        state.status = BreakerStatus::Open;
        store.set(state.clone()).unwrap();

        assert_eq!(store.get(BreakerType::GasSpike).unwrap(), Some(state));
    }

    #[test]
    fn test_get_all_in_declaration_order() {
        let store = InMemoryBreakerStore::new();
        for breaker in BreakerType::ALL.iter().rev() {
            store
                .set(CircuitBreakerState::new(*breaker, 1))
                .unwrap();
        }

        let types: Vec<_> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|s| s.breaker_type)
            .collect();
        assert_eq!(types, BreakerType::ALL.to_vec());
    }

    #[test]
    fn test_update_creates_then_transforms() {
        let store = InMemoryBreakerStore::new();

        let created = store
            .update(BreakerType::OracleStale, &mut |current| {
                assert!(current.is_none());
                CircuitBreakerState::new(BreakerType::OracleStale, 2)
            })
            .unwrap();
        assert_eq!(store.get(BreakerType::OracleStale).unwrap(), Some(created));

        let opened = store
            .update(BreakerType::OracleStale, &mut |current| {
                let mut state = current.unwrap();
                state.status = BreakerStatus::Open;
                state
            })
            .unwrap();
        assert_eq!(opened.status, BreakerStatus::Open);
        assert_eq!(
            store.get(BreakerType::OracleStale).unwrap().unwrap().status,
            BreakerStatus::Open
        );
    }
}
