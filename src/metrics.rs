//! # Metrics
//!
//! $$
//! L=\frac1n\sum_{i=1}^n \ell(y_i,\hat y_i)
//! $$
//!
//! Forecast-error losses over paired slices and daily-return risk measures.

/// Trading days per year used for all annualization in this crate.
pub const TRADING_DAYS: f64 = 252.0;

/// Mean Absolute Error: MAE = (1/N) Σ|actual_i - predicted_i|
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
  actual
    .iter()
    .zip(predicted.iter())
    .map(|(a, p)| (a - p).abs())
    .sum::<f64>()
    / actual.len() as f64
}

/// Mean Squared Error: MSE = (1/N) Σ(actual_i - predicted_i)²
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
  actual
    .iter()
    .zip(predicted.iter())
    .map(|(a, p)| (a - p).powi(2))
    .sum::<f64>()
    / actual.len() as f64
}

/// Root Mean Squared Error: RMSE = √MSE
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
  mse(actual, predicted).sqrt()
}

/// Mean Absolute Percentage Error (in %): MAPE = (100/N) Σ[|actual_i - predicted_i| / |actual_i|]
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
  let sum: f64 = actual
    .iter()
    .zip(predicted.iter())
    .map(|(a, p)| {
      if a.abs() < f64::EPSILON {
        0.0
      } else {
        (a - p).abs() / a.abs()
      }
    })
    .sum();
  (sum / actual.len() as f64) * 100.0
}

/// Annualized Sharpe ratio of a daily simple-return series.
///
/// Uses the linear annualization `mean × 252` of the unscaled daily mean, the
/// convention of quick-look risk summaries; the backtest engine compounds
/// instead. Returns NaN when the daily standard deviation is zero or
/// undefined.
pub fn sharpe_ratio(daily_returns: &[f64], risk_free_annual: f64) -> f64 {
  let clean: Vec<f64> = daily_returns.iter().copied().filter(|r| r.is_finite()).collect();
  if clean.len() < 2 {
    return f64::NAN;
  }
  let mu = clean.iter().sum::<f64>() / clean.len() as f64;
  let var = clean.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / (clean.len() - 1) as f64;
  let sd = var.sqrt();
  if sd == 0.0 || sd.is_nan() {
    return f64::NAN;
  }
  (mu * TRADING_DAYS - risk_free_annual) / (sd * TRADING_DAYS.sqrt())
}

/// Historical Value-at-Risk: the empirical (1 - alpha) lower percentile of the
/// daily return distribution, with linear interpolation between order
/// statistics.
pub fn historical_var(daily_returns: &[f64], alpha: f64) -> f64 {
  let mut clean: Vec<f64> = daily_returns.iter().copied().filter(|r| r.is_finite()).collect();
  if clean.is_empty() {
    return f64::NAN;
  }
  clean.sort_by(f64::total_cmp);
  let pct = (1.0 - alpha).clamp(0.0, 1.0);
  let rank = pct * (clean.len() - 1) as f64;
  let lo = rank.floor() as usize;
  let hi = rank.ceil() as usize;
  if lo == hi {
    clean[lo]
  } else {
    let frac = rank - lo as f64;
    clean[lo] + frac * (clean[hi] - clean[lo])
  }
}
