//! # Portfolio Optimization
//!
//! $$
//! \min_{\mathbf w}\ \mathbf w^\top\Sigma\,\mathbf w
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w = 1,\ \mu^\top\mathbf w = r^\*
//! $$
//!
//! Mean-variance inputs built from daily return history, a dense active-set
//! quadratic solver, and the frontier/extremal portfolio sweeps on top of it.

pub mod frontier;
pub mod inputs;
pub mod qp;

use serde::Deserialize;
use serde::Serialize;

pub use frontier::efficient_frontier;
pub use frontier::max_sharpe;
pub use frontier::min_volatility;
pub use frontier::FrontierCurve;
pub use frontier::FrontierPoint;
pub use inputs::build_covariance;
pub use inputs::build_expected_returns;
pub use inputs::PortfolioInputs;

use crate::error::QuantError;
use crate::error::Result;

/// Ordered symbol→weight mapping. Preserves insertion order so optimizer
/// output lines up with the requested ticker order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Weights {
  entries: Vec<(String, f64)>,
}

impl Weights {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from (symbol, weight) pairs; later duplicates overwrite earlier.
  pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Self {
    let mut weights = Self::new();
    for (symbol, weight) in pairs {
      weights.insert(symbol, weight);
    }
    weights
  }

  pub fn insert(&mut self, symbol: impl Into<String>, weight: f64) {
    let symbol = symbol.into();
    match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
      Some(entry) => entry.1 = weight,
      None => self.entries.push((symbol, weight)),
    }
  }

  pub fn get(&self, symbol: &str) -> Option<f64> {
    self.entries.iter().find(|(s, _)| s == symbol).map(|(_, w)| *w)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn symbols(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(s, _)| s.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.entries.iter().map(|(s, w)| (s.as_str(), *w))
  }

  pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
    self.entries.iter().map(|(_, w)| *w)
  }

  pub fn sum(&self) -> f64 {
    self.entries.iter().map(|(_, w)| w).sum()
  }

  /// Symbols carrying a negative weight.
  pub fn negative_symbols(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .filter(|(_, w)| *w < 0.0)
      .map(|(s, _)| s.clone())
      .collect()
  }

  /// Scale entries so they sum to 1.
  pub fn normalized(&self) -> Result<Weights> {
    let total = self.sum();
    if total.abs() < 1e-12 {
      return Err(QuantError::invalid_weights("weight vector sums to zero"));
    }
    Ok(Self {
      entries: self.entries.iter().map(|(s, w)| (s.clone(), w / total)).collect(),
    })
  }
}

/// (expected return, volatility, Sharpe) evaluated at a solved weight vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_pairs_preserves_order_and_overwrites() {
    let mut w = Weights::from_pairs([("TSLA", 0.5), ("SPY", 0.3), ("BND", 0.2)]);
    w.insert("SPY", 0.4);
    let symbols: Vec<&str> = w.symbols().collect();
    assert_eq!(symbols, vec!["TSLA", "SPY", "BND"]);
    assert_eq!(w.get("SPY"), Some(0.4));
  }

  #[test]
  fn normalized_scales_to_unit_sum() {
    let w = Weights::from_pairs([("A", 2.0), ("B", 3.0), ("C", 5.0)]);
    let n = w.normalized().unwrap();
    assert!((n.sum() - 1.0).abs() < 1e-12);
    assert_eq!(n.get("A"), Some(0.2));
  }

  #[test]
  fn zero_sum_weights_are_invalid() {
    let w = Weights::from_pairs([("A", 0.5), ("B", -0.5)]);
    assert!(matches!(w.normalized(), Err(QuantError::InvalidWeights { .. })));
  }

  #[test]
  fn negative_symbols_lists_offenders() {
    let w = Weights::from_pairs([("A", 0.5), ("B", -0.1), ("C", -0.2)]);
    assert_eq!(w.negative_symbols(), vec!["B".to_string(), "C".to_string()]);
  }
}
