//! Per-call inputs and the decision value returned to the agent layer.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Modification key: suggested trade value in USD.
pub const MOD_TRADE_VALUE_USD: &str = "trade_value_usd";
/// Modification key: suggested slippage tolerance in basis points.
pub const MOD_SLIPPAGE_BPS: &str = "slippage_bps";

/// Economics of a proposed action.
///
/// Gas and slippage are estimates supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Notional value of the trade in USD.
    pub trade_value_usd: Decimal,
    /// Estimated gas cost in USD.
    #[serde(default)]
    pub gas_cost_usd: Decimal,
    /// Estimated slippage in basis points.
    #[serde(default)]
    pub slippage_bps: Decimal,
}

impl ActionParams {
    #[must_use]
    pub fn new(trade_value_usd: Decimal, gas_cost_usd: Decimal, slippage_bps: Decimal) -> Self {
        Self {
            trade_value_usd,
            gas_cost_usd,
            slippage_bps,
        }
    }

    /// Reject malformed economics (non-positive trade, negative costs).
    pub fn validate(&self) -> Result<()> {
        if self.trade_value_usd <= Decimal::ZERO {
            return Err(CoreError::input(
                "trade_value_usd",
                format!("must be > 0, got {}", self.trade_value_usd),
            ));
        }
        non_negative("gas_cost_usd", self.gas_cost_usd)?;
        non_negative("slippage_bps", self.slippage_bps)?;
        Ok(())
    }
}

/// Portfolio state at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Total portfolio value in USD.
    pub total_value_usd: Decimal,
    /// Capital currently deployed in positions, in USD.
    pub deployed_capital_usd: Decimal,
    /// Equity at the start of the trading day, in USD.
    pub day_start_equity_usd: Decimal,
    /// Current equity in USD.
    pub current_equity_usd: Decimal,
    /// Number of open positions.
    #[serde(default)]
    pub open_positions: u32,
    /// Number of trades already executed today.
    #[serde(default)]
    pub daily_trade_count: u32,
}

impl PortfolioSnapshot {
    /// Reject negative monetary figures.
    pub fn validate(&self) -> Result<()> {
        non_negative("total_value_usd", self.total_value_usd)?;
        non_negative("deployed_capital_usd", self.deployed_capital_usd)?;
        non_negative("day_start_equity_usd", self.day_start_equity_usd)?;
        non_negative("current_equity_usd", self.current_equity_usd)?;
        Ok(())
    }
}

fn non_negative(field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(CoreError::input(field, format!("must be >= 0, got {value}")));
    }
    Ok(())
}

/// Verdict for a proposed action.
///
/// A denial is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    /// Whether the action may execute.
    pub allowed: bool,
    /// Composite severity, 0-100.
    pub risk_score: u32,
    /// Why the action was denied. Empty when allowed.
    pub reason: String,
    /// Near-limit warnings, preserved even on approval.
    pub warnings: Vec<String>,
    /// Suggested adjusted parameters, keyed by field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<BTreeMap<String, Decimal>>,
}

impl RiskDecision {
    /// Maximum risk score.
    pub const MAX_SCORE: u32 = 100;

    /// An approval carrying the given warnings.
    #[must_use]
    pub fn approved(warnings: Vec<String>) -> Self {
        Self {
            allowed: true,
            risk_score: 0,
            reason: String::new(),
            warnings,
            modifications: None,
        }
    }

    /// A denial with the given score (clamped to 100) and reason.
    #[must_use]
    pub fn denied(risk_score: u32, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            risk_score: risk_score.min(Self::MAX_SCORE),
            reason: reason.into(),
            warnings: Vec::new(),
            modifications: None,
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_modifications(mut self, modifications: BTreeMap<String, Decimal>) -> Self {
        self.modifications = if modifications.is_empty() {
            None
        } else {
            Some(modifications)
        };
        self
    }

    #[must_use]
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// Suggested value for a modification key, if any.
    #[must_use]
    pub fn modification(&self, key: &str) -> Option<Decimal> {
        self.modifications.as_ref()?.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_value_usd: dec!(100000),
            deployed_capital_usd: dec!(20000),
            day_start_equity_usd: dec!(100000),
            current_equity_usd: dec!(100000),
            open_positions: 2,
            daily_trade_count: 3,
        }
    }

    #[test]
    fn test_action_validate_rejects_non_positive_trade() {
        assert!(ActionParams::new(dec!(0), dec!(1), dec!(10)).validate().is_err());
        assert!(ActionParams::new(dec!(-5), dec!(1), dec!(10)).validate().is_err());
        assert!(ActionParams::new(dec!(0.01), dec!(0), dec!(0)).validate().is_ok());
        assert!(ActionParams::new(dec!(100), dec!(1), dec!(10)).validate().is_ok());
    }

    #[test]
    fn test_action_validate_rejects_negative_costs() {
        let err = ActionParams::new(dec!(100), dec!(-1), dec!(10))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidInput {
                field: "gas_cost_usd",
                ..
            }
        ));
        assert!(ActionParams::new(dec!(100), dec!(1), dec!(-0.5))
            .validate()
            .is_err());
    }

    #[test]
    fn test_portfolio_validate() {
        assert!(portfolio().validate().is_ok());

        let mut bad = portfolio();
        bad.current_equity_usd = dec!(-0.01);
        assert!(bad.validate().is_err());

        let mut bad = portfolio();
        bad.deployed_capital_usd = dec!(-1);
        assert!(bad.validate().is_err());

        let mut zero = portfolio();
        zero.deployed_capital_usd = Decimal::ZERO;
        assert!(zero.validate().is_ok());
    }

    #[test]
    fn test_money_fields_accept_numbers_and_strings() {
        let action: ActionParams =
            serde_json::from_str(r#"{"trade_value_usd": "1234.56", "gas_cost_usd": 2.5}"#)
                .unwrap();
        assert_eq!(action.trade_value_usd, dec!(1234.56));
        assert_eq!(action.gas_cost_usd, dec!(2.5));
        assert_eq!(action.slippage_bps, Decimal::ZERO);
    }

    #[test]
    fn test_non_finite_numbers_rejected_at_parse() {
        for raw in [
            r#"{"trade_value_usd": "NaN"}"#,
            r#"{"trade_value_usd": "inf"}"#,
            r#"{"trade_value_usd": 1e400}"#,
        ] {
            assert!(serde_json::from_str::<ActionParams>(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_denied_clamps_score() {
        let decision = RiskDecision::denied(135, "too risky");
        assert!(decision.is_denied());
        assert_eq!(decision.risk_score, 100);
        assert_eq!(decision.reason, "too risky");
    }

    #[test]
    fn test_empty_modifications_become_none() {
        let decision = RiskDecision::approved(vec![]).with_modifications(BTreeMap::new());
        assert!(decision.modifications.is_none());
        assert!(decision.modification(MOD_TRADE_VALUE_USD).is_none());
    }

    #[test]
    fn test_modification_lookup() {
        let mut mods = BTreeMap::new();
        mods.insert(MOD_TRADE_VALUE_USD.to_string(), dec!(10000));
        let decision = RiskDecision::denied(30, "position size").with_modifications(mods);
        assert_eq!(decision.modification(MOD_TRADE_VALUE_USD), Some(dec!(10000)));
        assert_eq!(decision.modification(MOD_SLIPPAGE_BPS), None);
    }

    #[test]
    fn test_decision_json_omits_empty_modifications() {
        let json = serde_json::to_string(&RiskDecision::approved(vec![])).unwrap();
        assert!(!json.contains("modifications"));
    }
}
