//! # Backtesting
//!
//! Deterministic replay of target-weight portfolios through historical daily
//! returns, with optional monthly rebalancing, run side by side with a
//! benchmark over the identical window.

pub mod engine;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

pub use engine::Backtester;

use crate::portfolio::Weights;

/// Rebalancing cadence of the simulated portfolio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalancePolicy {
  /// Buy and hold: sleeves drift with realized returns.
  #[default]
  None,
  /// Reset sleeves to target weights on the first row of each new calendar
  /// month, after that row's value is recorded.
  Monthly,
}

/// Backtest window and conventions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
  /// First trading day of the window, inclusive.
  pub start: NaiveDate,
  /// Last trading day of the window, inclusive.
  pub end: NaiveDate,
  pub rebalance: RebalancePolicy,
  /// Annual risk-free rate used in Sharpe ratios.
  pub risk_free: f64,
  /// Permit negative target weights.
  pub allow_short: bool,
}

impl Default for BacktestConfig {
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2024, 8, 1).expect("valid literal date"),
      end: NaiveDate::from_ymd_opt(2025, 7, 31).expect("valid literal date"),
      rebalance: RebalancePolicy::None,
      risk_free: 0.045,
      allow_short: false,
    }
  }
}

/// Default 60/40 equity/bond proxy benchmark.
pub fn default_benchmark() -> Weights {
  Weights::from_pairs([("SPY", 0.60), ("BND", 0.40)])
}

/// Annualized summary of one daily-return series.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
  /// (1 + mean daily)^252 - 1.
  pub annual_return: f64,
  /// Sample daily standard deviation × √252.
  pub annual_volatility: f64,
  /// (annual return − risk-free) / annual volatility; NaN at zero volatility.
  pub sharpe: f64,
}

/// Daily returns, cumulative growth and summary statistics of one simulated
/// series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
  /// Day-over-day simple returns; the first entry is 0.
  pub daily: Vec<f64>,
  /// Cumulative product of (1 + daily).
  pub cumulative: Vec<f64>,
  pub stats: PerformanceStats,
}

/// Strategy and benchmark series over the shared date index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
  pub dates: Vec<NaiveDate>,
  pub strategy: SeriesResult,
  pub benchmark: SeriesResult,
}
