//! Performance metrics — pure functions that compute episode statistics.
//!
//! Every metric is a pure function: balance trajectory and/or position list
//! in, scalar out. No dependencies on the runner or the environment.
//!
//! Conventions:
//! - The balance trajectory holds the balance *after* each step; the initial
//!   balance is not part of it. Ratios and drawdown use the returns between
//!   consecutive trajectory entries; total return is measured from the
//!   initial balance.
//! - `periods` (N) is the number of steps taken, used for `sqrt(N)` scaling
//!   and the annualization exponent.
//! - Indeterminate ratios (near-zero spread or drawdown) are `NaN`, never an
//!   error and never infinity.

use serde::{Deserialize, Serialize};
use tradegym_core::Position;

/// Spreads and drawdowns at or below this are treated as zero.
pub const EPSILON: f64 = 1e-6;

/// Aggregate statistics for one completed episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Most negative drawdown as a fraction (e.g. `-0.15`).
    pub max_drawdown: f64,
    /// Trajectory index at which `max_drawdown` was reached.
    pub max_drawdown_index: Option<usize>,
    pub number_of_trades: usize,
    pub average_trade_duration: f64,
    pub long_fraction: f64,
    pub short_fraction: f64,
    pub neutral_fraction: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from the starting balance, the per-step balances
    /// and the position held after each step.
    pub fn compute(initial_balance: f64, balances: &[f64], positions: &[Position]) -> Self {
        let periods = balances.len();
        let returns = pct_change(balances);
        let (max_dd, max_dd_index) = max_drawdown(&returns);
        let annual = annual_return(&returns, periods);
        let fractions = position_fractions(positions);
        Self {
            total_return: total_return(initial_balance, balances),
            annual_return: annual,
            sharpe: sharpe_ratio(&returns, periods),
            sortino: sortino_ratio(&returns, periods),
            calmar: calmar_ratio(annual, max_dd),
            max_drawdown: max_dd,
            // Returns start one row after the trajectory does.
            max_drawdown_index: max_dd_index.map(|i| i + 1),
            number_of_trades: number_of_trades(positions),
            average_trade_duration: average_trade_duration(positions),
            long_fraction: fractions[2],
            short_fraction: fractions[0],
            neutral_fraction: fractions[1],
        }
    }
}

// ─── Return series ──────────────────────────────────────────────────

/// Simple period returns `b[i] / b[i-1] - 1`; one shorter than the input.
pub fn pct_change(balances: &[f64]) -> Vec<f64> {
    balances.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// `cumprod(1 + r)`.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Relative decline of the cumulative return from its running peak.
pub fn drawdowns(returns: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    cumulative_returns(returns)
        .into_iter()
        .map(|c| {
            peak = peak.max(c);
            (c - peak) / peak
        })
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// `final / initial - 1`. NaN for an empty trajectory or a zero start.
pub fn total_return(initial_balance: f64, balances: &[f64]) -> f64 {
    match balances.last() {
        Some(&last) if initial_balance != 0.0 => last / initial_balance - 1.0,
        _ => f64::NAN,
    }
}

/// `mean / std * sqrt(periods)`. NaN when std ≤ [`EPSILON`] or undefined.
pub fn sharpe_ratio(returns: &[f64], periods: usize) -> f64 {
    let std = sample_std(returns);
    if !(std > EPSILON) {
        return f64::NAN;
    }
    mean(returns) / std * (periods as f64).sqrt()
}

/// Like [`sharpe_ratio`] but divides by the standard deviation of the
/// negative returns only.
pub fn sortino_ratio(returns: &[f64], periods: usize) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let std = sample_std(&downside);
    if !(std > EPSILON) {
        return f64::NAN;
    }
    mean(returns) / std * (periods as f64).sqrt()
}

/// Minimum drawdown and the return index where it first occurs.
/// `(NaN, None)` for an empty series.
pub fn max_drawdown(returns: &[f64]) -> (f64, Option<usize>) {
    let mut worst: Option<(usize, f64)> = None;
    for (i, dd) in drawdowns(returns).into_iter().enumerate() {
        match worst {
            Some((_, w)) if dd >= w => {}
            _ if dd.is_nan() => {}
            _ => worst = Some((i, dd)),
        }
    }
    match worst {
        Some((i, dd)) => (dd, Some(i)),
        None => (f64::NAN, None),
    }
}

/// `cum_last ^ (periods / len(returns)) - 1`.
pub fn annual_return(returns: &[f64], periods: usize) -> f64 {
    match cumulative_returns(returns).last() {
        Some(&last) => last.powf(periods as f64 / returns.len() as f64) - 1.0,
        None => f64::NAN,
    }
}

/// `annual / |max_drawdown|`. NaN when |max_drawdown| ≤ [`EPSILON`].
pub fn calmar_ratio(annual_return: f64, max_drawdown: f64) -> f64 {
    if !(max_drawdown.abs() > EPSILON) {
        return f64::NAN;
    }
    annual_return / max_drawdown.abs()
}

// ─── Position statistics ────────────────────────────────────────────

/// Entries into a non-neutral position, starting from Neutral.
pub fn number_of_trades(positions: &[Position]) -> usize {
    let mut previous = Position::Neutral;
    let mut trades = 0;
    for &p in positions {
        if p != previous && !p.is_neutral() {
            trades += 1;
        }
        previous = p;
    }
    trades
}

/// Mean length of contiguous non-neutral runs; 0 when never in the market.
///
/// A direct Long→Short flip continues the same run.
pub fn average_trade_duration(positions: &[Position]) -> f64 {
    let mut runs: Vec<usize> = Vec::new();
    let mut current = 0;
    for p in positions {
        if p.is_neutral() {
            if current > 0 {
                runs.push(current);
            }
            current = 0;
        } else {
            current += 1;
        }
    }
    if current > 0 {
        runs.push(current);
    }
    if runs.is_empty() {
        return 0.0;
    }
    runs.iter().sum::<usize>() as f64 / runs.len() as f64
}

/// Fractions of time spent `[Short, Neutral, Long]`.
pub fn position_fractions(positions: &[Position]) -> [f64; 3] {
    let mut counts = [0usize; 3];
    for p in positions {
        counts[(p.sign() + 1) as usize] += 1;
    }
    if positions.is_empty() {
        return [f64::NAN; 3];
    }
    let n = positions.len() as f64;
    counts.map(|c| c as f64 / n)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). NaN for fewer than 2 values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
