//! Durable storage for tradeguard.
//!
//! - `FileBreakerStore`: breaker states in a single JSON document, so
//!   breakers survive restarts
//! - `DecisionJournal`: JSON Lines audit log of every risk decision

pub mod breaker_store;
pub mod error;
pub mod journal;

pub use breaker_store::FileBreakerStore;
pub use error::{PersistenceError, PersistenceResult};
pub use journal::{DecisionJournal, DecisionRecord};
