//! # ARIMA Engine
//!
//! $$
//! \phi(B)\,(1-B)^d X_t = c + \theta(B)\,\epsilon_t
//! $$
//!
//! Conditional sum-of-squares estimation of ARIMA(p, d, q) models with an
//! L-BFGS solver, Akaike scoring, and closed-form multi-step forecasts with
//! symmetric normal prediction intervals derived from the psi-weight
//! expansion.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use ndarray::Array1;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use crate::error::QuantError;
use crate::error::Result;
use crate::forecast::ModelOrder;
use crate::forecast::Trend;

/// Per-coefficient box applied during estimation; keeps the conditional
/// recursion away from explosive AR/MA regions.
const COEF_LIMIT: f64 = 0.99;

/// Cost returned when the residual recursion overflows; large enough that the
/// line search backs away, finite so the solver keeps running.
const DIVERGED_COST: f64 = 1e12;

/// L-BFGS history size.
const LBFGS_MEMORY: usize = 7;

/// Terminal numerical failure of a single candidate fit.
#[derive(Clone, Debug)]
pub struct NumericalError(pub String);

/// A fitted ARIMA model. Immutable once produced; owns the training tail
/// state needed to roll forecasts forward.
#[derive(Clone, Debug)]
pub struct FittedModel {
  /// Order of the fit.
  pub order: ModelOrder,
  /// Mean assumption used during estimation.
  pub trend: Trend,
  /// AR coefficients, lag 1 first.
  pub phi: Vec<f64>,
  /// MA coefficients, lag 1 first.
  pub theta: Vec<f64>,
  /// Intercept of the differenced series; zero under [`Trend::None`].
  pub intercept: f64,
  /// Innovation variance estimate.
  pub sigma2: f64,
  /// Gaussian conditional log-likelihood at the optimum.
  pub loglik: f64,
  /// Akaike information criterion.
  pub aic: f64,
  /// Whether the optimizer finished within its iteration budget.
  pub converged: bool,
  /// Last `p` values of the differenced training series, chronological.
  diff_tail: Vec<f64>,
  /// Last `q` conditional residuals, chronological.
  resid_tail: Vec<f64>,
  /// Last value of each partial-difference level `0..d`, used to undo the
  /// differencing when forecasting.
  level_tails: Vec<f64>,
}

/// Mean and two-sided interval forecast in return space.
#[derive(Clone, Debug)]
pub struct ForecastBands {
  pub mean: Vec<f64>,
  pub lower: Vec<f64>,
  pub upper: Vec<f64>,
}

#[derive(Clone)]
struct CssProblem {
  z: Vec<f64>,
  p: usize,
  q: usize,
  trend: Trend,
}

impl CssProblem {
  fn negative_loglik(&self, x: &[f64]) -> f64 {
    let (phi, theta, intercept) = unpack_params(x, self.p, self.q, self.trend);
    let (_, ss) = css_residuals(&self.z, &phi, &theta, intercept);
    let n_eff = self.z.len() - self.p;
    if n_eff == 0 {
      return DIVERGED_COST;
    }
    let sigma2 = ss / n_eff as f64;
    if !sigma2.is_finite() || sigma2 <= 0.0 {
      return DIVERGED_COST;
    }
    let ln_2pi = (2.0 * std::f64::consts::PI).ln();
    let cost = 0.5 * n_eff as f64 * (ln_2pi + sigma2.ln() + 1.0);
    if cost.is_finite() {
      cost
    } else {
      DIVERGED_COST
    }
  }
}

impl CostFunction for CssProblem {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    Ok(self.negative_loglik(x))
  }
}

impl Gradient for CssProblem {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let mut grad = vec![0.0; x.len()];
    let eps = 1e-8;
    let f0 = self.negative_loglik(x);

    for i in 0..x.len() {
      let mut x_plus = x.clone();
      x_plus[i] += eps;
      grad[i] = (self.negative_loglik(&x_plus) - f0) / eps;
    }

    Ok(grad)
  }
}

/// Fit one (p, d, q) candidate under an iteration budget.
///
/// A fit that exhausts the budget is still returned with `converged = false`;
/// only arithmetic breakdowns (overflowing recursion, degenerate variance,
/// series too short for the order) are reported as [`NumericalError`].
pub fn fit_order(
  y: &Array1<f64>,
  order: ModelOrder,
  trend: Trend,
  max_iters: u64,
) -> std::result::Result<FittedModel, NumericalError> {
  let ModelOrder { p, d, q } = order;
  if y.len() <= d + 1 {
    return Err(NumericalError(format!(
      "series of length {} is too short to difference {} times",
      y.len(),
      d
    )));
  }

  let (z, level_tails) = difference(y, d);
  let n_z = z.len();
  let n_params = p + q + usize::from(trend == Trend::Constant);
  let k = n_params + 1;
  if n_z <= p || n_z - p < k + 2 {
    return Err(NumericalError(format!(
      "order {} leaves too few observations ({} after differencing)",
      order, n_z
    )));
  }

  let (x_hat, converged) = if n_params == 0 {
    (Vec::new(), true)
  } else {
    let problem = CssProblem {
      z: z.clone(),
      p,
      q,
      trend,
    };
    let mut x0 = vec![0.0; n_params];
    if trend == Trend::Constant {
      x0[n_params - 1] = z.iter().sum::<f64>() / n_z as f64;
    }

    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, LBFGS_MEMORY);
    let res = Executor::new(problem, solver)
      .configure(|state| state.param(x0).max_iters(max_iters))
      .run()
      .map_err(|e| NumericalError(e.to_string()))?;

    let best = res
      .state
      .best_param
      .clone()
      .ok_or_else(|| NumericalError("optimizer produced no parameters".to_string()))?;
    if !res.state.best_cost.is_finite() || res.state.best_cost >= DIVERGED_COST {
      return Err(NumericalError("objective diverged over the whole search".to_string()));
    }
    let converged = match &res.state.termination_status {
      TerminationStatus::Terminated(TerminationReason::MaxItersReached) => false,
      TerminationStatus::Terminated(_) => true,
      TerminationStatus::NotTerminated => false,
    };
    (best, converged)
  };

  let (phi, theta, intercept) = unpack_params(&x_hat, p, q, trend);
  let (residuals, ss) = css_residuals(&z, &phi, &theta, intercept);
  let n_eff = n_z - p;
  let sigma2 = ss / n_eff as f64;
  if !sigma2.is_finite() || sigma2 <= 0.0 {
    return Err(NumericalError("degenerate innovation variance".to_string()));
  }

  let ln_2pi = (2.0 * std::f64::consts::PI).ln();
  let loglik = -0.5 * n_eff as f64 * (ln_2pi + sigma2.ln() + 1.0);
  let aic = 2.0 * k as f64 - 2.0 * loglik;

  let diff_tail = z[n_z - p..].to_vec();
  let resid_tail = residuals[residuals.len() - q..].to_vec();

  Ok(FittedModel {
    order,
    trend,
    phi,
    theta,
    intercept,
    sigma2,
    loglik,
    aic,
    converged,
    diff_tail,
    resid_tail,
    level_tails,
  })
}

/// Multi-step mean forecast with a symmetric normal interval at tail mass
/// `alpha`, on the scale of the original (undifferenced) series.
pub fn forecast_with_interval(model: &FittedModel, steps: usize, alpha: f64) -> Result<ForecastBands> {
  if steps == 0 {
    return Err(QuantError::invalid_input("forecast horizon must be at least 1 step"));
  }
  if !(alpha > 0.0 && alpha < 1.0) {
    return Err(QuantError::invalid_input(format!(
      "confidence tail mass must lie in (0, 1), got {}",
      alpha
    )));
  }

  let p = model.phi.len();
  let q = model.theta.len();
  let d = model.order.d;

  // Mean recursion on the differenced scale; future innovations are zero.
  let mut zbuf = model.diff_tail.clone();
  let mut ebuf = model.resid_tail.clone();
  let mut mean = Vec::with_capacity(steps);
  for _ in 0..steps {
    let mut v = model.intercept;
    for (i, ph) in model.phi.iter().enumerate() {
      v += ph * zbuf[zbuf.len() - 1 - i];
    }
    for (j, th) in model.theta.iter().enumerate() {
      v += th * ebuf[ebuf.len() - 1 - j];
    }
    zbuf.push(v);
    ebuf.push(0.0);
    mean.push(v);
  }

  // Undo the differencing, innermost level first.
  for level in (0..d).rev() {
    let mut acc = model.level_tails[level];
    for value in mean.iter_mut() {
      acc += *value;
      *value = acc;
    }
  }

  // Psi weights of the ARMA part, cumulated once per differencing level.
  let mut psi = vec![0.0; steps];
  psi[0] = 1.0;
  for j in 1..steps {
    let mut v = if j <= q { model.theta[j - 1] } else { 0.0 };
    for i in 1..=p.min(j) {
      v += model.phi[i - 1] * psi[j - i];
    }
    psi[j] = v;
  }
  for _ in 0..d {
    for j in 1..steps {
      psi[j] += psi[j - 1];
    }
  }

  let z_crit = Normal::new(0.0, 1.0).unwrap().inverse_cdf(1.0 - alpha / 2.0);
  let mut lower = Vec::with_capacity(steps);
  let mut upper = Vec::with_capacity(steps);
  let mut var_acc = 0.0;
  for h in 0..steps {
    var_acc += psi[h] * psi[h];
    let se = (model.sigma2 * var_acc).sqrt();
    lower.push(mean[h] - z_crit * se);
    upper.push(mean[h] + z_crit * se);
  }

  Ok(ForecastBands { mean, lower, upper })
}

/// Difference `y` in place `d` times, recording the last value of every
/// partial level so forecasts can be re-integrated.
fn difference(y: &Array1<f64>, d: usize) -> (Vec<f64>, Vec<f64>) {
  let mut current: Vec<f64> = y.to_vec();
  let mut tails = Vec::with_capacity(d);
  for _ in 0..d {
    tails.push(current[current.len() - 1]);
    current = current.windows(2).map(|w| w[1] - w[0]).collect();
  }
  (current, tails)
}

/// Conditional residual recursion; residuals before lag `p` are fixed at zero
/// and excluded from the sum of squares.
fn css_residuals(z: &[f64], phi: &[f64], theta: &[f64], intercept: f64) -> (Vec<f64>, f64) {
  let p = phi.len();
  let n = z.len();
  let mut residuals = vec![0.0; n];
  let mut ss = 0.0;
  for t in p..n {
    let mut pred = intercept;
    for (i, ph) in phi.iter().enumerate() {
      pred += ph * z[t - 1 - i];
    }
    for (j, th) in theta.iter().enumerate() {
      if t > j {
        pred += th * residuals[t - 1 - j];
      }
    }
    let resid = z[t] - pred;
    residuals[t] = resid;
    ss += resid * resid;
  }
  (residuals, ss)
}

fn unpack_params(x: &[f64], p: usize, q: usize, trend: Trend) -> (Vec<f64>, Vec<f64>, f64) {
  let clamp = |v: f64| v.clamp(-COEF_LIMIT, COEF_LIMIT);
  let phi: Vec<f64> = x[..p].iter().copied().map(clamp).collect();
  let theta: Vec<f64> = x[p..p + q].iter().copied().map(clamp).collect();
  let intercept = if trend == Trend::Constant { x[p + q] } else { 0.0 };
  (phi, theta, intercept)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal as GaussianNoise;

  use super::*;

  fn ar1_series(phi: f64, sigma: f64, n: usize, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = GaussianNoise::new(0.0, sigma).unwrap();
    let mut y = vec![0.0];
    for _ in 1..n {
      let prev = *y.last().unwrap();
      y.push(phi * prev + noise.sample(&mut rng));
    }
    Array1::from(y)
  }

  fn manual_model(phi: Vec<f64>, theta: Vec<f64>, d: usize, diff_tail: Vec<f64>, level_tails: Vec<f64>) -> FittedModel {
    let order = ModelOrder {
      p: phi.len(),
      d,
      q: theta.len(),
    };
    let resid_tail = vec![0.0; theta.len()];
    FittedModel {
      order,
      trend: Trend::None,
      phi,
      theta,
      intercept: 0.0,
      sigma2: 1.0,
      loglik: 0.0,
      aic: 0.0,
      converged: true,
      diff_tail,
      resid_tail,
      level_tails,
    }
  }

  #[test]
  fn css_residuals_match_hand_computation() {
    // z = [1, 2, 3], phi = 0.5: e_1 = 2 - 0.5, e_2 = 3 - 1.0
    let (residuals, ss) = css_residuals(&[1.0, 2.0, 3.0], &[0.5], &[], 0.0);
    assert_relative_eq!(residuals[1], 1.5, epsilon = 1e-12);
    assert_relative_eq!(residuals[2], 2.0, epsilon = 1e-12);
    assert_relative_eq!(ss, 1.5 * 1.5 + 4.0, epsilon = 1e-12);
  }

  #[test]
  fn white_noise_fit_recovers_variance() {
    let y = ar1_series(0.0, 0.02, 400, 7);
    let order = ModelOrder { p: 0, d: 0, q: 0 };
    let model = fit_order(&y, order, Trend::None, 200).unwrap();
    assert!(model.converged);
    let sample_var = y.iter().map(|v| v * v).sum::<f64>() / y.len() as f64;
    assert_relative_eq!(model.sigma2, sample_var, max_relative = 1e-9);
  }

  #[test]
  fn ar1_fit_recovers_coefficient() {
    let y = ar1_series(0.6, 0.05, 500, 11);
    let order = ModelOrder { p: 1, d: 0, q: 0 };
    let model = fit_order(&y, order, Trend::None, 200).unwrap();
    assert!((model.phi[0] - 0.6).abs() < 0.15, "phi estimate {} too far", model.phi[0]);
    assert!(model.aic.is_finite());
    assert!(model.sigma2 > 0.0);
  }

  #[test]
  fn short_series_is_a_numerical_failure() {
    let y = Array1::from(vec![0.01, -0.02, 0.005]);
    let order = ModelOrder { p: 3, d: 0, q: 3 };
    assert!(fit_order(&y, order, Trend::None, 200).is_err());
  }

  #[test]
  fn ar1_forecast_decays_geometrically() {
    let model = manual_model(vec![0.5], vec![], 0, vec![2.0], vec![]);
    let bands = forecast_with_interval(&model, 4, 0.05).unwrap();
    assert_relative_eq!(bands.mean[0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(bands.mean[1], 0.5, epsilon = 1e-12);
    assert_relative_eq!(bands.mean[2], 0.25, epsilon = 1e-12);
    assert_relative_eq!(bands.mean[3], 0.125, epsilon = 1e-12);
  }

  #[test]
  fn interval_width_is_nondecreasing() {
    let model = manual_model(vec![0.7], vec![], 0, vec![1.0], vec![]);
    let bands = forecast_with_interval(&model, 20, 0.05).unwrap();
    let widths: Vec<f64> = bands
      .upper
      .iter()
      .zip(bands.lower.iter())
      .map(|(u, l)| u - l)
      .collect();
    assert!(widths.windows(2).all(|w| w[1] >= w[0] - 1e-12));
  }

  #[test]
  fn random_walk_forecast_is_flat_at_last_level() {
    // ARIMA(0,1,0): differenced forecasts are zero, levels stay at the tail.
    let model = manual_model(vec![], vec![], 1, vec![], vec![42.0]);
    let bands = forecast_with_interval(&model, 5, 0.05).unwrap();
    assert!(bands.mean.iter().all(|m| (m - 42.0).abs() < 1e-12));
    // Random-walk variance grows linearly, so the band keeps widening.
    assert!(bands.upper[4] - bands.lower[4] > bands.upper[0] - bands.lower[0]);
  }

  #[test]
  fn rejects_bad_horizon_and_alpha() {
    let model = manual_model(vec![0.5], vec![], 0, vec![1.0], vec![]);
    assert!(forecast_with_interval(&model, 0, 0.05).is_err());
    assert!(forecast_with_interval(&model, 5, 0.0).is_err());
    assert!(forecast_with_interval(&model, 5, 1.0).is_err());
  }

  #[test]
  fn ma1_fit_stays_invertible() {
    // Simulate MA(1): y_t = e_t + 0.4 e_{t-1}.
    let mut rng = StdRng::seed_from_u64(3);
    let noise = GaussianNoise::new(0.0, 0.01).unwrap();
    let mut eps_prev = 0.0;
    let mut y = Vec::with_capacity(400);
    for _ in 0..400 {
      let eps: f64 = noise.sample(&mut rng);
      y.push(eps + 0.4 * eps_prev);
      eps_prev = eps;
    }
    let order = ModelOrder { p: 0, d: 0, q: 1 };
    let model = fit_order(&Array1::from(y), order, Trend::None, 200).unwrap();
    assert!(model.theta[0].abs() <= COEF_LIMIT + 1e-12);
    assert!((model.theta[0] - 0.4).abs() < 0.2, "theta estimate {}", model.theta[0]);
  }
}
