//! # Settings
//!
//! Crate-level research configuration: the default universe, study window
//! and rate conventions shared by the engines. Component-specific knobs live
//! on their own request/config structs.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use crate::portfolio::Weights;

/// Immutable project configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  /// First date of the study window, inclusive.
  pub start: NaiveDate,
  /// Last date of the study window, inclusive.
  pub end: NaiveDate,
  /// Research universe.
  pub tickers: Vec<String>,
  /// Annual risk-free rate.
  pub risk_free_rate: f64,
  /// Benchmark target weights.
  pub benchmark: Weights,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2015, 7, 1).expect("valid literal date"),
      end: NaiveDate::from_ymd_opt(2025, 7, 31).expect("valid literal date"),
      tickers: vec!["TSLA".to_string(), "BND".to_string(), "SPY".to_string()],
      risk_free_rate: 0.02,
      benchmark: crate::backtest::default_benchmark(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_cover_the_reference_universe() {
    let settings = Settings::default();
    assert_eq!(settings.tickers.len(), 3);
    assert!(settings.tickers.iter().any(|t| t == "SPY"));
    assert_eq!(settings.risk_free_rate, 0.02);
    assert_eq!(settings.benchmark.get("SPY"), Some(0.60));
    assert_eq!(settings.benchmark.get("BND"), Some(0.40));
    assert!(settings.start < settings.end);
  }
}
