//! # Path Replay
//!
//! One notional unit of capital is split across sleeves by normalized target
//! weight on the first trading day. Each day every sleeve grows by its
//! asset's realized simple return; sleeve values are summed into the
//! portfolio value path, which is then converted to day-over-day returns.
//! Rebalancing resets sleeves to target weights at month boundaries, taking
//! effect on the following day's growth. All validation happens before any
//! simulation runs.

use chrono::Datelike;

use crate::backtest::default_benchmark;
use crate::backtest::BacktestConfig;
use crate::backtest::BacktestResult;
use crate::backtest::PerformanceStats;
use crate::backtest::RebalancePolicy;
use crate::backtest::SeriesResult;
use crate::error::QuantError;
use crate::error::Result;
use crate::market::ReturnMatrix;
use crate::metrics::TRADING_DAYS;
use crate::portfolio::Weights;

/// Replays weighted portfolios through a return matrix.
#[derive(Clone, Debug)]
pub struct Backtester<'a> {
  returns: &'a ReturnMatrix,
  config: BacktestConfig,
}

impl<'a> Backtester<'a> {
  pub fn new(returns: &'a ReturnMatrix, config: BacktestConfig) -> Self {
    Self { returns, config }
  }

  pub fn config(&self) -> &BacktestConfig {
    &self.config
  }

  /// Run strategy and benchmark over the configured window. A missing
  /// benchmark defaults to the 60/40 SPY/BND split. Fails with the complete
  /// set of absent tickers or offending weights before any simulation runs.
  pub fn run(&self, strategy: &Weights, benchmark: Option<&Weights>) -> Result<BacktestResult> {
    let window = self.returns.window(Some(self.config.start), Some(self.config.end));
    if window.is_empty() {
      return Err(QuantError::invalid_input(format!(
        "no trading rows between {} and {}",
        self.config.start, self.config.end
      )));
    }

    let benchmark = benchmark.cloned().unwrap_or_else(default_benchmark);

    let mut missing = window.missing_symbols(strategy.symbols());
    for symbol in window.missing_symbols(benchmark.symbols()) {
      if !missing.contains(&symbol) {
        missing.push(symbol);
      }
    }
    if !missing.is_empty() {
      return Err(QuantError::MissingAssets(missing));
    }

    self.validate_weights(strategy, "strategy")?;
    self.validate_weights(&benchmark, "benchmark")?;

    let (strategy_daily, benchmark_daily) = rayon::join(
      || simulate_path(&window, strategy, self.config.rebalance),
      || simulate_path(&window, &benchmark, self.config.rebalance),
    );
    let strategy_daily = strategy_daily?;
    let benchmark_daily = benchmark_daily?;

    Ok(BacktestResult {
      dates: window.dates().to_vec(),
      strategy: build_series(strategy_daily, self.config.risk_free),
      benchmark: build_series(benchmark_daily, self.config.risk_free),
    })
  }

  fn validate_weights(&self, weights: &Weights, label: &str) -> Result<()> {
    if weights.is_empty() {
      return Err(QuantError::invalid_weights(format!("{} weights are empty", label)));
    }
    if !self.config.allow_short {
      let negative = weights.negative_symbols();
      if !negative.is_empty() {
        return Err(QuantError::invalid_weights(format!(
          "{} weights are negative with short-selling disabled: {}",
          label,
          negative.join(", ")
        )));
      }
    }
    if weights.sum().abs() < 1e-12 {
      return Err(QuantError::invalid_weights(format!("{} weights sum to zero", label)));
    }
    Ok(())
  }
}

/// Grow sleeves day by day and convert the value path to daily returns. The
/// walk is strictly sequential: each day's sleeve state depends on the prior
/// day's.
fn simulate_path(window: &ReturnMatrix, weights: &Weights, rebalance: RebalancePolicy) -> Result<Vec<f64>> {
  let normalized = weights.normalized()?;
  let target: Vec<f64> = normalized.values().collect();
  let columns: Vec<&[f64]> = normalized
    .symbols()
    .map(|symbol| window.column(symbol).unwrap_or(&[]))
    .collect();

  let dates = window.dates();
  let mut sleeves = target.clone();
  let mut value_path = Vec::with_capacity(dates.len());
  let mut last_month = dates[0].month();

  for (row, date) in dates.iter().enumerate() {
    for (sleeve, column) in sleeves.iter_mut().zip(columns.iter()) {
      *sleeve *= 1.0 + column[row];
    }
    let value: f64 = sleeves.iter().sum();
    value_path.push(value);

    if rebalance == RebalancePolicy::Monthly && date.month() != last_month {
      for (sleeve, w) in sleeves.iter_mut().zip(target.iter()) {
        *sleeve = value * w;
      }
    }
    last_month = date.month();
  }

  let mut daily = Vec::with_capacity(value_path.len());
  daily.push(0.0);
  for t in 1..value_path.len() {
    daily.push((value_path[t] - value_path[t - 1]) / value_path[t - 1]);
  }
  Ok(daily)
}

fn build_series(daily: Vec<f64>, risk_free: f64) -> SeriesResult {
  let mut cumulative = Vec::with_capacity(daily.len());
  let mut level = 1.0;
  for r in &daily {
    level *= 1.0 + r;
    cumulative.push(level);
  }
  let stats = annualize(&daily, risk_free);
  SeriesResult {
    daily,
    cumulative,
    stats,
  }
}

/// Annualized statistics of a daily return series, including the leading
/// zero return of the first day.
fn annualize(daily: &[f64], risk_free: f64) -> PerformanceStats {
  let n = daily.len();
  let mean = daily.iter().sum::<f64>() / n as f64;
  let sd = if n < 2 {
    f64::NAN
  } else {
    (daily.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
  };

  let annual_return = (1.0 + mean).powf(TRADING_DAYS) - 1.0;
  let annual_volatility = sd * TRADING_DAYS.sqrt();
  let sharpe = if annual_volatility > 0.0 {
    (annual_return - risk_free) / annual_volatility
  } else {
    f64::NAN
  };

  PerformanceStats {
    annual_return,
    annual_volatility,
    sharpe,
  }
}
