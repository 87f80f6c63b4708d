//! # Efficient Frontier
//!
//! Frontier sweep and extremal portfolios over mean-variance inputs. Each
//! frontier target solves a minimum-variance program pinned to that expected
//! return; infeasible targets are skipped, so the curve may come back shorter
//! than requested, possibly empty for degenerate inputs.

use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::QuantError;
use crate::error::Result;
use crate::portfolio::inputs::PortfolioInputs;
use crate::portfolio::qp;
use crate::portfolio::qp::QpProblem;
use crate::portfolio::PortfolioPerformance;
use crate::portfolio::Weights;

/// Weights whose magnitude falls below this cutoff are zeroed after an
/// extremal solve. The remainder is intentionally not renormalized; the
/// residual stays within one cutoff of unity and downstream consumers expect
/// exactly this behavior.
pub const CLEAN_CUTOFF: f64 = 1e-4;

/// Default number of frontier targets.
pub const DEFAULT_FRONTIER_POINTS: usize = 50;

/// One frontier point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
  pub volatility: f64,
  pub expected_return: f64,
}

/// Frontier points sorted by ascending volatility.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontierCurve {
  pub points: Vec<FrontierPoint>,
}

impl FrontierCurve {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }
}

fn performance(inputs: &PortfolioInputs, w: &[f64]) -> PortfolioPerformance {
  let expected_return = qp::dot(w, &inputs.expected_returns);
  let variance = qp::dot(w, &qp::mat_vec_mul(&inputs.covariance, w));
  let volatility = variance.max(0.0).sqrt();
  let sharpe = if volatility > 0.0 {
    (expected_return - inputs.risk_free) / volatility
  } else {
    f64::NAN
  };
  PortfolioPerformance {
    expected_return,
    volatility,
    sharpe,
  }
}

/// Zero weights below [`CLEAN_CUTOFF`] without renormalizing the remainder.
fn clean_weights(w: &[f64]) -> Vec<f64> {
  w.iter()
    .map(|wi| if wi.abs() < CLEAN_CUTOFF { 0.0 } else { *wi })
    .collect()
}

fn named_weights(inputs: &PortfolioInputs, w: &[f64]) -> Weights {
  Weights::from_pairs(inputs.tickers.iter().map(String::as_str).zip(w.iter().copied()))
}

/// Minimum-variance weights achieving exactly `target` expected return, long
/// only with the unit budget.
fn solve_target_return(inputs: &PortfolioInputs, target: f64) -> Result<Vec<f64>> {
  let n = inputs.tickers.len();
  let mu = &inputs.expected_returns;
  let ones = vec![1.0; n];
  let a = vec![ones, mu.clone()];
  let b = vec![1.0, target];
  let lower = vec![0.0; n];
  let upper = vec![1.0; n];
  let problem = QpProblem {
    q: &inputs.covariance,
    a: &a,
    b: &b,
    lower: &lower,
    upper: &upper,
  };

  // Feasible start: blend of the extreme-return assets hitting the target.
  let (lo_idx, lo_ret) = arg_extreme(mu, false);
  let (hi_idx, hi_ret) = arg_extreme(mu, true);
  let span = hi_ret - lo_ret;
  if span.abs() < 1e-14 && (target - lo_ret).abs() > 1e-12 {
    return Err(QuantError::infeasible("target outside the attainable return range"));
  }
  let lam = if span.abs() < 1e-14 {
    0.0
  } else {
    ((target - lo_ret) / span).clamp(0.0, 1.0)
  };
  let mut x0 = vec![0.0; n];
  x0[lo_idx] += 1.0 - lam;
  x0[hi_idx] += lam;

  qp::solve(&problem, x0)
}

fn arg_extreme(values: &[f64], maximize: bool) -> (usize, f64) {
  let mut best = (0, values[0]);
  for (i, v) in values.iter().enumerate().skip(1) {
    if (maximize && *v > best.1) || (!maximize && *v < best.1) {
      best = (i, *v);
    }
  }
  best
}

/// Sweep `n_points` targets linearly spaced between the minimum and maximum
/// single-asset expected return. Infeasible targets are skipped with a debug
/// log; surviving points come back sorted by ascending volatility.
pub fn efficient_frontier(inputs: &PortfolioInputs, n_points: usize) -> Result<FrontierCurve> {
  let mu = &inputs.expected_returns;
  let (_, r_min) = arg_extreme(mu, false);
  let (_, r_max) = arg_extreme(mu, true);

  let targets: Vec<f64> = if n_points == 0 {
    Vec::new()
  } else if n_points == 1 {
    vec![r_min]
  } else {
    let step = (r_max - r_min) / (n_points - 1) as f64;
    (0..n_points).map(|i| r_min + step * i as f64).collect()
  };

  let mut points: Vec<FrontierPoint> = targets
    .par_iter()
    .filter_map(|target| match solve_target_return(inputs, *target) {
      Ok(w) => {
        let perf = performance(inputs, &w);
        Some(FrontierPoint {
          volatility: perf.volatility,
          expected_return: perf.expected_return,
        })
      }
      Err(err) => {
        debug!(target_return = *target, %err, "frontier target skipped");
        None
      }
    })
    .collect();

  points.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));
  Ok(FrontierCurve { points })
}

/// Maximum-Sharpe (tangency) portfolio via the unit-excess-return
/// normalization: minimize y'Σy subject to (μ - rf)'y = 1, y ≥ 0, then scale
/// y back to the weight simplex.
pub fn max_sharpe(inputs: &PortfolioInputs) -> Result<(Weights, PortfolioPerformance)> {
  let n = inputs.tickers.len();
  let excess: Vec<f64> = inputs.expected_returns.iter().map(|r| r - inputs.risk_free).collect();
  let (best_idx, best_excess) = arg_extreme(&excess, true);
  if best_excess <= 0.0 {
    return Err(QuantError::infeasible(
      "max-Sharpe requires at least one asset with expected return above the risk-free rate",
    ));
  }

  let a = vec![excess.clone()];
  let b = vec![1.0];
  let lower = vec![0.0; n];
  let upper = vec![f64::INFINITY; n];
  let problem = QpProblem {
    q: &inputs.covariance,
    a: &a,
    b: &b,
    lower: &lower,
    upper: &upper,
  };
  let mut y0 = vec![0.0; n];
  y0[best_idx] = 1.0 / best_excess;

  let y = qp::solve(&problem, y0)?;
  let total: f64 = y.iter().sum();
  if total <= 0.0 || !total.is_finite() {
    return Err(QuantError::infeasible("max-Sharpe normalization collapsed"));
  }
  let w: Vec<f64> = y.iter().map(|yi| yi / total).collect();

  let perf = performance(inputs, &w);
  Ok((named_weights(inputs, &clean_weights(&w)), perf))
}

/// Global minimum-variance portfolio, long only with the unit budget.
pub fn min_volatility(inputs: &PortfolioInputs) -> Result<(Weights, PortfolioPerformance)> {
  let n = inputs.tickers.len();
  let ones = vec![1.0; n];
  let a = vec![ones];
  let b = vec![1.0];
  let lower = vec![0.0; n];
  let upper = vec![1.0; n];
  let problem = QpProblem {
    q: &inputs.covariance,
    a: &a,
    b: &b,
    lower: &lower,
    upper: &upper,
  };
  let x0 = vec![1.0 / n as f64; n];

  let w = qp::solve(&problem, x0)?;
  let perf = performance(inputs, &w);
  Ok((named_weights(inputs, &clean_weights(&w)), perf))
}
