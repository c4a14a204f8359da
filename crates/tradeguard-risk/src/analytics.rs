//! Portfolio risk analytics.
//!
//! Pure functions over historical series. Computed on demand, not on every
//! action.

use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Trading days per year, used to annualise daily ratios.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Confidence level used for the composite score's VaR component.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

const DRAWDOWN_POINTS: f64 = 40.0;
const VAR_POINTS: f64 = 25.0;
const CONCENTRATION_POINTS: f64 = 20.0;
const SHARPE_POINTS: f64 = 15.0;
/// Daily VaR (as a fraction) at which the VaR component saturates.
const VAR_SATURATION: f64 = 0.05;
/// Sharpe ratio at or above which the inverse-Sharpe component is zero.
const SHARPE_TARGET: f64 = 2.0;

/// Summary of portfolio-level risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskStats {
    /// Maximum peak-to-trough decline, in percent.
    pub max_drawdown_pct: f64,
    /// Annualised Sharpe ratio of daily returns.
    pub sharpe_ratio: f64,
    /// Annualised Sortino ratio of daily returns.
    pub sortino_ratio: f64,
    /// One-day historical VaR at 95%, as a positive fraction of equity.
    pub value_at_risk_95: f64,
    /// Herfindahl index of position weights.
    pub concentration_index: f64,
    /// Composite score, 0-100.
    pub risk_score: u32,
}

/// Largest peak-to-trough decline in `equity_curve`, as a positive percentage.
///
/// Points before the first positive peak are ignored.
#[must_use]
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
            continue;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak * 100.0);
        }
    }

    max_dd
}

/// Simple returns between consecutive equity points.
///
/// Pairs starting from a non-positive value are skipped.
#[must_use]
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Annualised Sharpe ratio: `mean / stddev * sqrt(252)`.
///
/// Returns 0 with fewer than two samples or zero volatility.
#[must_use]
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = mean(returns);
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return 0.0;
    }

    mean / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualised Sortino ratio: `mean / downside_deviation * sqrt(252)`.
///
/// Downside deviation uses only negative returns, averaged over the full
/// sample count. Returns 0 when there is no downside.
#[must_use]
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mean = mean(returns);
    let downside_variance = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let downside_dev = downside_variance.sqrt();

    if downside_dev == 0.0 {
        return 0.0;
    }

    mean / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Historical Value-at-Risk.
///
/// For `confidence = 0.95` this is the 5th percentile of `returns`,
/// reported as a positive loss fraction (0 when that percentile is a gain).
pub fn value_at_risk(returns: &[f64], confidence: f64) -> RiskResult<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(RiskError::InvalidInput(format!(
            "VaR confidence must be within (0, 1), got {confidence}"
        )));
    }
    if returns.is_empty() {
        return Ok(0.0);
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);

    let index = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Ok((-sorted[index]).max(0.0))
}

/// Herfindahl concentration index: `sum(w_i^2)`.
///
/// Weights are expected to sum to 1; a single position scores 1.
#[must_use]
pub fn concentration_index(weights: &[f64]) -> f64 {
    weights.iter().map(|w| w * w).sum()
}

/// Blend drawdown, VaR, concentration and inverse Sharpe into 0-100.
///
/// - drawdown: up to 40 pts, saturating at `drawdown_limit_pct`
/// - VaR: up to 25 pts, saturating at a 5% daily VaR
/// - concentration: up to 20 pts, `hhi * 20`
/// - inverse Sharpe: up to 15 pts, 0 at Sharpe >= 2, 15 at Sharpe <= 0
#[must_use]
pub fn composite_risk_score(
    drawdown_pct: f64,
    var_95: f64,
    hhi: f64,
    sharpe: f64,
    drawdown_limit_pct: f64,
) -> u32 {
    let drawdown_ratio = if drawdown_limit_pct > 0.0 {
        drawdown_pct / drawdown_limit_pct
    } else if drawdown_pct > 0.0 {
        1.0
    } else {
        0.0
    };

    let drawdown = drawdown_ratio.clamp(0.0, 1.0) * DRAWDOWN_POINTS;
    let var = (var_95 / VAR_SATURATION).clamp(0.0, 1.0) * VAR_POINTS;
    let concentration = hhi.clamp(0.0, 1.0) * CONCENTRATION_POINTS;
    let inverse_sharpe = (1.0 - sharpe / SHARPE_TARGET).clamp(0.0, 1.0) * SHARPE_POINTS;

    let total = drawdown + var + concentration + inverse_sharpe;
    total.round().clamp(0.0, 100.0) as u32
}

/// Compute every statistic for an equity curve and position weights.
///
/// `drawdown_limit_pct` is the configured drawdown limit used to scale the
/// drawdown component of the score.
pub fn portfolio_risk(
    equity_curve: &[f64],
    position_weights: &[f64],
    drawdown_limit_pct: f64,
) -> RiskResult<PortfolioRiskStats> {
    if let Some(bad) = equity_curve.iter().find(|v| !v.is_finite()) {
        return Err(RiskError::InvalidInput(format!(
            "equity curve contains non-finite value {bad}"
        )));
    }
    if let Some(bad) = position_weights
        .iter()
        .find(|w| !w.is_finite() || **w < 0.0)
    {
        return Err(RiskError::InvalidInput(format!(
            "position weight must be finite and >= 0, got {bad}"
        )));
    }

    let returns = daily_returns(equity_curve);
    let max_drawdown = max_drawdown_pct(equity_curve);
    let sharpe = sharpe_ratio(&returns);
    let sortino = sortino_ratio(&returns);
    let var_95 = value_at_risk(&returns, DEFAULT_VAR_CONFIDENCE)?;
    let hhi = concentration_index(position_weights);

    Ok(PortfolioRiskStats {
        max_drawdown_pct: max_drawdown,
        sharpe_ratio: sharpe,
        sortino_ratio: sortino,
        value_at_risk_95: var_95,
        concentration_index: hhi,
        risk_score: composite_risk_score(max_drawdown, var_95, hhi, sharpe, drawdown_limit_pct),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_drawdown_empty_and_monotonic() {
        assert_eq!(max_drawdown_pct(&[]), 0.0);
        assert_eq!(max_drawdown_pct(&[100.0, 110.0, 120.0]), 0.0);
    }

    #[test]
    fn test_drawdown_peak_to_trough() {
        // Peak 120, trough 90 = 25%
        let curve = [100.0, 120.0, 100.0, 90.0, 130.0, 117.0];
        assert!(approx(max_drawdown_pct(&curve), 25.0));
    }

    #[test]
    fn test_daily_returns() {
        let returns = daily_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(returns.len(), 2);
        assert!(approx(returns[0], 0.10));
        assert!(approx(returns[1], -0.10));
    }

    #[test]
    fn test_sharpe_zero_volatility() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(sharpe_ratio(&[0.01]), 0.0);
    }

    #[test]
    fn test_sharpe_sign_follows_mean() {
        assert!(sharpe_ratio(&[0.02, -0.01, 0.03, 0.01]) > 0.0);
        assert!(sharpe_ratio(&[-0.02, 0.01, -0.03, -0.01]) < 0.0);
    }

    #[test]
    fn test_sharpe_value() {
        // mean 0.01, population stddev 0.01
        let sharpe = sharpe_ratio(&[0.0, 0.02]);
        assert!(approx(sharpe, 252.0_f64.sqrt()));
    }

    #[test]
    fn test_sortino_no_downside() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.0]), 0.0);
    }

    #[test]
    fn test_sortino_value() {
        // mean = 0.0, so sortino = 0 regardless of downside
        assert!(approx(sortino_ratio(&[0.02, -0.02]), 0.0));

        // downside variance = 0.0004 / 2, mean 0.01
        let returns = [0.04, -0.02];
        let expected = 0.01 / (0.0004_f64 / 2.0).sqrt() * 252.0_f64.sqrt();
        assert!(approx(sortino_ratio(&returns), expected));
    }

    #[test]
    fn test_var_percentile() {
        let returns: Vec<f64> = (1..=100).map(|i| (i as f64 - 50.0) / 1000.0).collect();
        // sorted[5] = (6 - 50) / 1000
        let var = value_at_risk(&returns, 0.95).unwrap();
        assert!(approx(var, 0.044));
    }

    #[test]
    fn test_var_all_gains_is_zero() {
        assert_eq!(value_at_risk(&[0.01, 0.02, 0.03], 0.95).unwrap(), 0.0);
        assert_eq!(value_at_risk(&[], 0.95).unwrap(), 0.0);
    }

    #[test]
    fn test_var_invalid_confidence() {
        assert!(value_at_risk(&[0.01], 1.0).is_err());
        assert!(value_at_risk(&[0.01], 0.0).is_err());
        assert!(value_at_risk(&[0.01], f64::NAN).is_err());
    }

    #[test]
    fn test_concentration_index() {
        assert!(approx(concentration_index(&[1.0]), 1.0));
        assert!(approx(concentration_index(&[0.25, 0.25, 0.25, 0.25]), 0.25));
        assert_eq!(concentration_index(&[]), 0.0);
    }

    #[test]
    fn test_composite_score_bounds() {
        assert_eq!(composite_risk_score(0.0, 0.0, 0.0, 5.0, 20.0), 0);
        assert_eq!(composite_risk_score(50.0, 0.2, 1.0, -1.0, 20.0), 100);
    }

    #[test]
    fn test_composite_score_components() {
        // Half the drawdown limit = 20, no VaR, hhi 0.5 = 10, sharpe 1 = 7.5
        assert_eq!(composite_risk_score(10.0, 0.0, 0.5, 1.0, 20.0), 38);
    }

    #[test]
    fn test_composite_score_zero_drawdown_limit() {
        assert_eq!(composite_risk_score(0.0, 0.0, 0.0, 2.0, 0.0), 0);
        assert_eq!(composite_risk_score(1.0, 0.0, 0.0, 2.0, 0.0), 40);
    }

    #[test]
    fn test_portfolio_risk_rejects_bad_input() {
        assert!(portfolio_risk(&[100.0, f64::NAN], &[1.0], 20.0).is_err());
        assert!(portfolio_risk(&[100.0, 101.0], &[-0.5, 1.5], 20.0).is_err());
    }

    #[test]
    fn test_portfolio_risk_stats() {
        let curve = [100.0, 102.0, 101.0, 104.0, 98.0, 103.0];
        let stats = portfolio_risk(&curve, &[0.5, 0.3, 0.2], 20.0).unwrap();

        assert!(stats.max_drawdown_pct > 5.0 && stats.max_drawdown_pct < 6.0);
        assert!(approx(stats.concentration_index, 0.38));
        assert!(stats.value_at_risk_95 > 0.0);
        assert!(stats.risk_score <= 100);
    }
}
