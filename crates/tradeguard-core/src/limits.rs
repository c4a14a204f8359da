//! Risk limit configuration.

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Risk limits applied by the pre-flight checks.
///
/// Only `max_position_size_usd` is required; every other field has a
/// serde default so a TOML `[limits]` table may name just the fields it
/// changes. Values are never clamped: call [`RiskLimits::validate`] (or
/// [`RiskLimits::validated`]) before activating a set of limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Largest single trade in USD. Must be > 0.
    pub max_position_size_usd: Decimal,
    /// Deployed capital after the trade as % of portfolio value (0-100).
    #[serde(default = "default_max_portfolio_exposure_pct")]
    pub max_portfolio_exposure_pct: Decimal,
    /// Maximum estimated slippage in basis points (0-10000).
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: Decimal,
    /// Maximum gas cost as % of trade value (0-100).
    #[serde(default = "default_max_gas_cost_pct")]
    pub max_gas_cost_pct: Decimal,
    /// Maximum intraday equity loss as % of start-of-day equity (0-100).
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: Decimal,
    /// Maximum peak-to-trough drawdown % used by portfolio scoring (0-100).
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: Decimal,
    /// Maximum number of concurrently open positions.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: u32,
    /// Maximum number of trades per day.
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
}

fn default_max_portfolio_exposure_pct() -> Decimal {
    dec!(100)
}

fn default_max_slippage_bps() -> Decimal {
    dec!(100)
}

fn default_max_gas_cost_pct() -> Decimal {
    Decimal::ONE
}

fn default_max_daily_loss_pct() -> Decimal {
    dec!(10)
}

fn default_max_drawdown_pct() -> Decimal {
    dec!(20)
}

fn default_max_open_positions() -> u32 {
    20
}

fn default_max_daily_trades() -> u32 {
    50
}

impl RiskLimits {
    /// Limits with the given position cap and defaults everywhere else.
    ///
    /// The result is not validated yet.
    #[must_use]
    pub fn new(max_position_size_usd: Decimal) -> Self {
        Self {
            max_position_size_usd,
            max_portfolio_exposure_pct: default_max_portfolio_exposure_pct(),
            max_slippage_bps: default_max_slippage_bps(),
            max_gas_cost_pct: default_max_gas_cost_pct(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_drawdown_pct: default_max_drawdown_pct(),
            max_open_positions: default_max_open_positions(),
            max_daily_trades: default_max_daily_trades(),
        }
    }

    /// Validate and return the limits.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Check every field against its allowed range.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.max_position_size_usd <= Decimal::ZERO {
            return Err(CoreError::limit(
                "max_position_size_usd",
                format!("must be > 0, got {}", self.max_position_size_usd),
            ));
        }

        check_range("max_portfolio_exposure_pct", self.max_portfolio_exposure_pct, dec!(100))?;
        check_range("max_slippage_bps", self.max_slippage_bps, dec!(10000))?;
        check_range("max_gas_cost_pct", self.max_gas_cost_pct, dec!(100))?;
        check_range("max_daily_loss_pct", self.max_daily_loss_pct, dec!(100))?;
        check_range("max_drawdown_pct", self.max_drawdown_pct, dec!(100))?;

        if self.max_open_positions == 0 {
            return Err(CoreError::limit("max_open_positions", "must be positive"));
        }
        if self.max_daily_trades == 0 {
            return Err(CoreError::limit("max_daily_trades", "must be positive"));
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: Decimal, max: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > max {
        return Err(CoreError::limit(
            field,
            format!("must be within 0-{max}, got {value}"),
        ));
    }
    Ok(())
}
