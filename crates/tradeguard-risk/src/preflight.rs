//! Pre-flight validation checks.
//!
//! Seven independent checks run against every proposed action. Unlike a
//! fail-fast gate chain, every check is always evaluated so the caller sees
//! all failures and warnings at once.
//!
//! # Checks
//!
//! | # | Check | Fails when | Warns at | Weight |
//! |---|-------|------------|----------|--------|
//! | 1 | PositionSize | trade > max position | 80% | 30 |
//! | 2 | PortfolioExposure | exposure after trade > max | 90% | 25 |
//! | 3 | GasCost | gas / trade > max | 75% | 15 |
//! | 4 | Slippage | slippage > max | 80% | 20 |
//! | 5 | DailyLoss | intraday loss >= max | 75% | 35 |
//! | 6 | DailyTrades | trades today >= max | - | 10 |
//! | 7 | OpenPositions | open positions >= max | - | 10 |
//!
//! Only failed checks add their weight to the risk score.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use tradeguard_core::{
    ActionParams, PortfolioSnapshot, RiskDecision, RiskLimits, MOD_SLIPPAGE_BPS,
    MOD_TRADE_VALUE_USD,
};

use crate::error::RiskResult;

const POSITION_WARN_FRACTION: Decimal = dec!(0.80);
const EXPOSURE_WARN_FRACTION: Decimal = dec!(0.90);
const GAS_WARN_FRACTION: Decimal = dec!(0.75);
const SLIPPAGE_WARN_FRACTION: Decimal = dec!(0.80);
const DAILY_LOSS_WARN_FRACTION: Decimal = dec!(0.75);

/// Identifies one pre-flight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreFlightCheck {
    PositionSize,
    PortfolioExposure,
    GasCost,
    Slippage,
    DailyLoss,
    DailyTrades,
    OpenPositions,
}

impl PreFlightCheck {
    /// All checks in evaluation order.
    pub const ALL: [PreFlightCheck; 7] = [
        Self::PositionSize,
        Self::PortfolioExposure,
        Self::GasCost,
        Self::Slippage,
        Self::DailyLoss,
        Self::DailyTrades,
        Self::OpenPositions,
    ];

    /// Score contributed when this check fails.
    #[must_use]
    pub fn weight(self) -> u32 {
        match self {
            Self::PositionSize => 30,
            Self::PortfolioExposure => 25,
            Self::GasCost => 15,
            Self::Slippage => 20,
            Self::DailyLoss => 35,
            Self::DailyTrades => 10,
            Self::OpenPositions => 10,
        }
    }

    /// Stable snake_case name, used as a metrics label.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PositionSize => "position_size",
            Self::PortfolioExposure => "portfolio_exposure",
            Self::GasCost => "gas_cost",
            Self::Slippage => "slippage",
            Self::DailyLoss => "daily_loss",
            Self::DailyTrades => "daily_trades",
            Self::OpenPositions => "open_positions",
        }
    }
}

impl fmt::Display for PreFlightCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a single pre-flight check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: PreFlightCheck,
    pub passed: bool,
    /// Failure description. `None` when passed.
    pub failure: Option<String>,
    /// Near-limit warning.
    pub warning: Option<String>,
    /// Score contribution (full weight on failure, otherwise 0).
    pub score: u32,
    /// Suggested adjustment: (modification key, value).
    pub suggestion: Option<(&'static str, Decimal)>,
}

impl CheckOutcome {
    fn pass(check: PreFlightCheck) -> Self {
        Self {
            check,
            passed: true,
            failure: None,
            warning: None,
            score: 0,
            suggestion: None,
        }
    }

    fn warn(check: PreFlightCheck, warning: String) -> Self {
        Self {
            warning: Some(warning),
            ..Self::pass(check)
        }
    }

    fn fail(check: PreFlightCheck, failure: String) -> Self {
        Self {
            check,
            passed: false,
            failure: Some(failure),
            warning: None,
            score: check.weight(),
            suggestion: None,
        }
    }

    fn with_suggestion(mut self, key: &'static str, value: Decimal) -> Self {
        self.suggestion = Some((key, value));
        self
    }

    pub fn is_pass(&self) -> bool {
        self.passed
    }

    pub fn is_fail(&self) -> bool {
        !self.passed
    }
}

/// Outcomes of every check plus the composite decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PreFlightReport {
    pub outcomes: Vec<CheckOutcome>,
    pub decision: RiskDecision,
}

impl PreFlightReport {
    /// Checks that failed.
    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| o.is_fail())
    }
}

/// Pre-flight validator.
///
/// Stateless: the same inputs always produce the same decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreFlightValidator;

impl PreFlightValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate an action and return the composite decision.
    ///
    /// Threshold violations produce `Ok` with `allowed == false`. Only
    /// malformed input (`trade_value_usd <= 0`, negative costs or balances)
    /// returns `Err(RiskError::InvalidInput)`.
    pub fn validate(
        &self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> RiskResult<RiskDecision> {
        self.evaluate(action, portfolio, limits)
            .map(|report| report.decision)
    }

    /// Like [`validate`](Self::validate), but also returns each check's outcome.
    pub fn evaluate(
        &self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> RiskResult<PreFlightReport> {
        action.validate()?;
        portfolio.validate()?;

        let outcomes = self.check_all(action, portfolio, limits);
        let decision = Self::aggregate(&outcomes);

        debug!(
            allowed = decision.allowed,
            risk_score = decision.risk_score,
            warnings = decision.warnings.len(),
            "pre-flight evaluated"
        );

        Ok(PreFlightReport { outcomes, decision })
    }

    /// Run all seven checks. No short-circuit.
    ///
    /// Inputs are assumed valid; use [`evaluate`](Self::evaluate) for
    /// untrusted input.
    pub fn check_all(
        &self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> Vec<CheckOutcome> {
        let outcomes = vec![
            self.check_position_size(action, limits),
            self.check_portfolio_exposure(action, portfolio, limits),
            self.check_gas_cost(action, limits),
            self.check_slippage(action, limits),
            self.check_daily_loss(portfolio, limits),
            self.check_daily_trades(portfolio, limits),
            self.check_open_positions(portfolio, limits),
        ];

        for outcome in outcomes.iter().filter(|o| o.is_fail()) {
            trace!(
                check = %outcome.check,
                reason = outcome.failure.as_deref().unwrap_or_default(),
                "pre-flight check failed"
            );
        }

        outcomes
    }

    /// Fold check outcomes into a decision.
    #[must_use]
    pub fn aggregate(outcomes: &[CheckOutcome]) -> RiskDecision {
        let score: u32 = outcomes.iter().map(|o| o.score).sum();
        let warnings: Vec<String> = outcomes.iter().filter_map(|o| o.warning.clone()).collect();

        let mut modifications = BTreeMap::new();
        for (key, value) in outcomes.iter().filter_map(|o| o.suggestion) {
            modifications
                .entry(key.to_string())
                .and_modify(|v: &mut Decimal| *v = (*v).min(value))
                .or_insert(value);
        }

        let failures: Vec<&str> = outcomes
            .iter()
            .filter_map(|o| o.failure.as_deref())
            .collect();

        let decision = if failures.is_empty() {
            RiskDecision::approved(warnings)
        } else {
            RiskDecision::denied(score, failures.join("; ")).with_warnings(warnings)
        };

        decision.with_modifications(modifications)
    }

    /// Check 1: Position Size
    pub fn check_position_size(&self, action: &ActionParams, limits: &RiskLimits) -> CheckOutcome {
        let check = PreFlightCheck::PositionSize;
        let value = action.trade_value_usd;
        let limit = limits.max_position_size_usd;

        if value > limit {
            return CheckOutcome::fail(
                check,
                format!("Position size ${value:.2} exceeds limit ${limit:.2}"),
            )
            .with_suggestion(MOD_TRADE_VALUE_USD, limit);
        }

        if near_limit(value, limit, POSITION_WARN_FRACTION) {
            return CheckOutcome::warn(
                check,
                format!(
                    "Position size ${value:.2} is {:.0}% of limit ${limit:.2}",
                    percent_of(value, limit).unwrap_or(Decimal::ONE_HUNDRED)
                ),
            );
        }

        CheckOutcome::pass(check)
    }

    /// Check 2: Portfolio Exposure
    ///
    /// Exposure after the trade: `(deployed + trade) / total * 100`.
    pub fn check_portfolio_exposure(
        &self,
        action: &ActionParams,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> CheckOutcome {
        let check = PreFlightCheck::PortfolioExposure;
        let limit = limits.max_portfolio_exposure_pct;

        if portfolio.total_value_usd <= Decimal::ZERO {
            return CheckOutcome::fail(
                check,
                "Portfolio exposure undefined: total portfolio value is zero".to_string(),
            );
        }

        let Some(exposure_pct) = portfolio
            .deployed_capital_usd
            .checked_add(action.trade_value_usd)
            .and_then(|after| percent_of(after, portfolio.total_value_usd))
        else {
            return CheckOutcome::fail(
                check,
                format!("Portfolio exposure out of range, limit {limit:.2}%"),
            );
        };

        if exposure_pct > limit {
            return CheckOutcome::fail(
                check,
                format!("Portfolio exposure {exposure_pct:.2}% exceeds limit {limit:.2}%"),
            );
        }

        if near_limit(exposure_pct, limit, EXPOSURE_WARN_FRACTION) {
            return CheckOutcome::warn(
                check,
                format!("Portfolio exposure {exposure_pct:.2}% is near limit {limit:.2}%"),
            );
        }

        CheckOutcome::pass(check)
    }

    /// Check 3: Gas Cost Ratio
    pub fn check_gas_cost(&self, action: &ActionParams, limits: &RiskLimits) -> CheckOutcome {
        let check = PreFlightCheck::GasCost;
        let limit = limits.max_gas_cost_pct;
        let Some(gas_pct) = percent_of(action.gas_cost_usd, action.trade_value_usd) else {
            return CheckOutcome::fail(
                check,
                format!("Gas cost out of range, limit {limit:.2}%"),
            );
        };

        if gas_pct > limit {
            return CheckOutcome::fail(
                check,
                format!("Gas cost {gas_pct:.2}% of trade value exceeds limit {limit:.2}%"),
            );
        }

        if near_limit(gas_pct, limit, GAS_WARN_FRACTION) {
            return CheckOutcome::warn(
                check,
                format!("Gas cost {gas_pct:.2}% of trade value is near limit {limit:.2}%"),
            );
        }

        CheckOutcome::pass(check)
    }

    /// Check 4: Slippage
    pub fn check_slippage(&self, action: &ActionParams, limits: &RiskLimits) -> CheckOutcome {
        let check = PreFlightCheck::Slippage;
        let value = action.slippage_bps;
        let limit = limits.max_slippage_bps;

        if value > limit {
            return CheckOutcome::fail(
                check,
                format!("Slippage {value:.1} bps exceeds limit {limit:.1} bps"),
            )
            .with_suggestion(MOD_SLIPPAGE_BPS, limit);
        }

        if near_limit(value, limit, SLIPPAGE_WARN_FRACTION) {
            return CheckOutcome::warn(
                check,
                format!("Slippage {value:.1} bps is near limit {limit:.1} bps"),
            );
        }

        CheckOutcome::pass(check)
    }

    /// Check 5: Daily Loss
    ///
    /// Loss is measured from start-of-day equity; a day that starts at zero
    /// equity has no measurable loss.
    pub fn check_daily_loss(
        &self,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> CheckOutcome {
        let check = PreFlightCheck::DailyLoss;
        let limit = limits.max_daily_loss_pct;
        let start = portfolio.day_start_equity_usd;

        // Both figures are validated non-negative, so the difference cannot overflow.
        let loss = start - portfolio.current_equity_usd;
        let loss_pct = if start > Decimal::ZERO && loss > Decimal::ZERO {
            percent_of(loss, start).unwrap_or(Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };

        if loss_pct >= limit {
            return CheckOutcome::fail(
                check,
                format!("Daily loss {loss_pct:.2}% reached limit {limit:.2}%"),
            );
        }

        if near_limit(loss_pct, limit, DAILY_LOSS_WARN_FRACTION) {
            return CheckOutcome::warn(
                check,
                format!("Daily loss {loss_pct:.2}% is near limit {limit:.2}%"),
            );
        }

        CheckOutcome::pass(check)
    }

    /// Check 6: Daily Trade Count
    pub fn check_daily_trades(
        &self,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> CheckOutcome {
        let count = portfolio.daily_trade_count;
        let limit = limits.max_daily_trades;

        if count >= limit {
            return CheckOutcome::fail(
                PreFlightCheck::DailyTrades,
                format!("Daily trade count {count} reached limit {limit}"),
            );
        }

        CheckOutcome::pass(PreFlightCheck::DailyTrades)
    }

    /// Check 7: Open Position Count
    pub fn check_open_positions(
        &self,
        portfolio: &PortfolioSnapshot,
        limits: &RiskLimits,
    ) -> CheckOutcome {
        let count = portfolio.open_positions;
        let limit = limits.max_open_positions;

        if count >= limit {
            return CheckOutcome::fail(
                PreFlightCheck::OpenPositions,
                format!("Open positions {count} reached limit {limit}"),
            );
        }

        CheckOutcome::pass(PreFlightCheck::OpenPositions)
    }
}

/// `part / whole * 100`. `None` on overflow or a zero `whole`.
///
/// Scales before dividing so cent-denominated inputs stay exact; very large
/// parts fall back to dividing first.
fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    match part.checked_mul(Decimal::ONE_HUNDRED) {
        Some(scaled) => scaled.checked_div(whole),
        None => part.checked_div(whole)?.checked_mul(Decimal::ONE_HUNDRED),
    }
}

/// A zero limit has no warning tier.
fn near_limit(value: Decimal, limit: Decimal, fraction: Decimal) -> bool {
    limit > Decimal::ZERO
        && limit
            .checked_mul(fraction)
            .is_some_and(|threshold| value >= threshold)
}
