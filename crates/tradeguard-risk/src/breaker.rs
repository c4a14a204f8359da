//! Circuit breaker types and state transitions.
//!
//! `CircuitBreakerState` is a plain value. Every transition is a pure
//! function `(state, event, now) -> state`, so the state machine can be
//! tested without a manager or a store:
//!
//! ```text
//! CLOSED    --trip-->                          OPEN
//! OPEN      --now >= cooldown_until-->         HALF_OPEN   (evaluated lazily)
//! HALF_OPEN --probes_required successes-->     CLOSED
//! HALF_OPEN --probe failure / trip-->          OPEN        (cooldown restarts)
//! any       --reset-->                         CLOSED
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

// ============================================================================
// BreakerType
// ============================================================================

/// The six system-wide breakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerType {
    PortfolioDrawdown,
    FlashCrash,
    GasSpike,
    RpcFailure,
    OracleStale,
    ContractAnomaly,
}

impl BreakerType {
    pub const ALL: [BreakerType; 6] = [
        Self::PortfolioDrawdown,
        Self::FlashCrash,
        Self::GasSpike,
        Self::RpcFailure,
        Self::OracleStale,
        Self::ContractAnomaly,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortfolioDrawdown => "PORTFOLIO_DRAWDOWN",
            Self::FlashCrash => "FLASH_CRASH",
            Self::GasSpike => "GAS_SPIKE",
            Self::RpcFailure => "RPC_FAILURE",
            Self::OracleStale => "ORACLE_STALE",
            Self::ContractAnomaly => "CONTRACT_ANOMALY",
        }
    }

    /// Default cooldown before an open breaker may start probing.
    #[must_use]
    pub fn default_cooldown(self) -> Duration {
        match self {
            Self::PortfolioDrawdown => Duration::minutes(30),
            Self::FlashCrash => Duration::minutes(15),
            Self::GasSpike => Duration::minutes(5),
            Self::RpcFailure => Duration::minutes(2),
            Self::OracleStale => Duration::minutes(5),
            Self::ContractAnomaly => Duration::minutes(60),
        }
    }

    /// Default number of probe successes needed to close from half-open.
    #[must_use]
    pub fn default_probes_required(self) -> u32 {
        match self {
            Self::PortfolioDrawdown => 3,
            Self::FlashCrash => 5,
            Self::GasSpike => 2,
            Self::RpcFailure => 3,
            Self::OracleStale => 2,
            Self::ContractAnomaly => 5,
        }
    }
}

impl fmt::Display for BreakerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakerType {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| RiskError::InvalidInput(format!("unknown breaker type: {s}")))
    }
}

// ============================================================================
// BreakerStatus
// ============================================================================

/// Breaker status. Only `Closed` permits normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStatus {
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open.
    #[must_use]
    pub fn as_gauge(self) -> i64 {
        match self {
            Self::Closed => 0,
            Self::HalfOpen => 1,
            Self::Open => 2,
        }
    }
}

impl fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Longest cooldown an override may configure: one year.
pub const MAX_COOLDOWN_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Per-type override, as read from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerOverride {
    /// Cooldown in milliseconds, within `0..=MAX_COOLDOWN_MS`.
    #[serde(default)]
    pub cooldown_ms: Option<i64>,
    /// Probe successes required to close. Must be >= 1.
    #[serde(default)]
    pub half_open_probes: Option<u32>,
}

/// Effective settings for one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub cooldown: Duration,
    pub probes_required: u32,
}

impl BreakerSettings {
    #[must_use]
    pub fn defaults_for(breaker: BreakerType) -> Self {
        Self {
            cooldown: breaker.default_cooldown(),
            probes_required: breaker.default_probes_required(),
        }
    }

    /// Defaults for `breaker` with `ov` applied.
    ///
    /// Out-of-range cooldowns and zero probes are rejected, never clamped.
    pub fn with_override(breaker: BreakerType, ov: &BreakerOverride) -> RiskResult<Self> {
        let mut settings = Self::defaults_for(breaker);

        if let Some(ms) = ov.cooldown_ms {
            if !(0..=MAX_COOLDOWN_MS).contains(&ms) {
                return Err(RiskError::Config(format!(
                    "{breaker}: cooldown_ms must be within 0-{MAX_COOLDOWN_MS}, got {ms}"
                )));
            }
            settings.cooldown = Duration::milliseconds(ms);
        }

        if let Some(probes) = ov.half_open_probes {
            if probes == 0 {
                return Err(RiskError::Config(format!(
                    "{breaker}: half_open_probes must be >= 1"
                )));
            }
            settings.probes_required = probes;
        }

        Ok(settings)
    }
}

/// Settings for all six breakers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    settings: HashMap<BreakerType, BreakerSettings>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            settings: BreakerType::ALL
                .into_iter()
                .map(|t| (t, BreakerSettings::defaults_for(t)))
                .collect(),
        }
    }
}

impl BreakerConfig {
    /// Build from an override map. Types not in the map use defaults.
    pub fn from_overrides(overrides: &HashMap<BreakerType, BreakerOverride>) -> RiskResult<Self> {
        let mut config = Self::default();
        for (breaker, ov) in overrides {
            config
                .settings
                .insert(*breaker, BreakerSettings::with_override(*breaker, ov)?);
        }
        Ok(config)
    }

    #[must_use]
    pub fn settings(&self, breaker: BreakerType) -> BreakerSettings {
        self.settings
            .get(&breaker)
            .copied()
            .unwrap_or_else(|| BreakerSettings::defaults_for(breaker))
    }
}

// ============================================================================
// CircuitBreakerState
// ============================================================================

/// Persistent state of one breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub breaker_type: BreakerType,
    pub status: BreakerStatus,
    pub tripped_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub probe_successes: u32,
    pub probes_required: u32,
    /// Total trips over the breaker's lifetime. Never decremented.
    pub trip_count: u32,
    pub last_reason: Option<String>,
}

impl CircuitBreakerState {
    /// A fresh, closed breaker.
    #[must_use]
    pub fn new(breaker_type: BreakerType, probes_required: u32) -> Self {
        Self {
            breaker_type,
            status: BreakerStatus::Closed,
            tripped_at: None,
            cooldown_until: None,
            probe_successes: 0,
            probes_required,
            trip_count: 0,
            last_reason: None,
        }
    }

    /// Trip: any state → Open. Refreshes the cooldown when already open.
    #[must_use]
    pub fn tripped(
        self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Self {
        Self {
            status: BreakerStatus::Open,
            tripped_at: Some(now),
            cooldown_until: Some(cooldown_deadline(now, cooldown)),
            probe_successes: 0,
            trip_count: self.trip_count.saturating_add(1),
            last_reason: Some(reason.into()),
            ..self
        }
    }

    /// Lazy cooldown evaluation: Open → HalfOpen once `now >= cooldown_until`.
    #[must_use]
    pub fn evaluated(self, now: DateTime<Utc>) -> Self {
        match (self.status, self.cooldown_until) {
            (BreakerStatus::Open, Some(until)) if now >= until => Self {
                status: BreakerStatus::HalfOpen,
                probe_successes: 0,
                ..self
            },
            _ => self,
        }
    }

    /// Probe success. Only meaningful in HalfOpen.
    #[must_use]
    pub fn probe_succeeded(self) -> Self {
        if self.status != BreakerStatus::HalfOpen {
            return self;
        }

        let successes = self.probe_successes.saturating_add(1);
        if successes >= self.probes_required {
            self.closed()
        } else {
            Self {
                probe_successes: successes,
                ..self
            }
        }
    }

    /// Probe failure: HalfOpen → Open with a fresh cooldown and
    /// `probe_successes` reset to zero. No-op in other states.
    #[must_use]
    pub fn probe_failed(
        self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Self {
        if self.status != BreakerStatus::HalfOpen {
            return self;
        }
        self.tripped(reason, now, cooldown)
    }

    /// Manual reset: any state → Closed. `trip_count` and `last_reason` are kept.
    #[must_use]
    pub fn reset(self) -> Self {
        self.closed()
    }

    fn closed(self) -> Self {
        Self {
            status: BreakerStatus::Closed,
            tripped_at: None,
            cooldown_until: None,
            probe_successes: 0,
            ..self
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }

    /// Time left before probing may start. `None` unless open.
    #[must_use]
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.status, self.cooldown_until) {
            (BreakerStatus::Open, Some(until)) if until > now => Some(until - now),
            _ => None,
        }
    }
}

/// `now + cooldown`, saturating at the latest representable instant.
fn cooldown_deadline(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    now.checked_add_signed(cooldown)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
