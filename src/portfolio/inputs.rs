//! # Optimizer Inputs
//!
//! Annualized expected-return vectors and covariance matrices built from
//! daily return history. An asset's expected return may instead be sourced
//! from a previously computed forward daily-return series; malformed sources
//! fall back to the historical estimate rather than failing.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::error::QuantError;
use crate::error::Result;
use crate::market::ReturnMatrix;
use crate::metrics::TRADING_DAYS;

/// Forward daily-return series per symbol, typically the mean path of a
/// stored forecast.
pub type ForecastSources = HashMap<String, Vec<f64>>;

/// Inputs to the mean-variance solvers: tickers, annualized expected returns,
/// annualized covariance and the annual risk-free rate, all in one aligned
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioInputs {
  pub tickers: Vec<String>,
  pub expected_returns: Vec<f64>,
  pub covariance: Vec<Vec<f64>>,
  pub risk_free: f64,
}

impl PortfolioInputs {
  /// Validate dimensions and rough symmetry of the covariance.
  pub fn new(
    tickers: Vec<String>,
    expected_returns: Vec<f64>,
    covariance: Vec<Vec<f64>>,
    risk_free: f64,
  ) -> Result<Self> {
    let n = tickers.len();
    if n == 0 {
      return Err(QuantError::invalid_input("portfolio inputs need at least one asset"));
    }
    if expected_returns.len() != n {
      return Err(QuantError::invalid_input(format!(
        "{} tickers but {} expected returns",
        n,
        expected_returns.len()
      )));
    }
    if covariance.len() != n || covariance.iter().any(|row| row.len() != n) {
      return Err(QuantError::invalid_input(format!("covariance must be {}x{}", n, n)));
    }
    for i in 0..n {
      for j in (i + 1)..n {
        if (covariance[i][j] - covariance[j][i]).abs() > 1e-8 {
          return Err(QuantError::invalid_input(format!(
            "covariance not symmetric at ({}, {})",
            i, j
          )));
        }
      }
    }
    Ok(Self {
      tickers,
      expected_returns,
      covariance,
      risk_free,
    })
  }
}

fn finite_mean(values: &[f64]) -> Option<f64> {
  let mut sum = 0.0;
  let mut count = 0usize;
  for v in values {
    if v.is_finite() {
      sum += v;
      count += 1;
    }
  }
  if count == 0 {
    None
  } else {
    Some(sum / count as f64)
  }
}

/// Annualized expected return per requested ticker: mean daily simple return
/// × 252. A ticker present in `sources` is estimated from its forward
/// daily-return series instead, annualized identically; an empty or
/// non-finite source falls back to history with a warning.
pub fn build_expected_returns(
  matrix: &ReturnMatrix,
  tickers: &[String],
  sources: &ForecastSources,
) -> Result<Vec<f64>> {
  let missing = matrix.missing_symbols(tickers.iter().map(String::as_str));
  if !missing.is_empty() {
    return Err(QuantError::MissingAssets(missing));
  }

  let mut expected = Vec::with_capacity(tickers.len());
  for ticker in tickers {
    let historical = || {
      finite_mean(matrix.column(ticker).unwrap_or(&[]))
        .ok_or_else(|| QuantError::invalid_input(format!("no finite observations for {}", ticker)))
    };

    let daily = match sources.get(ticker) {
      Some(forward) => match finite_mean(forward) {
        Some(mean) => mean,
        None => {
          warn!(ticker = ticker.as_str(), "forecast source unusable, falling back to history");
          historical()?
        }
      },
      None => historical()?,
    };
    expected.push(daily * TRADING_DAYS);
  }
  Ok(expected)
}

/// Annualized sample covariance (daily covariance × 252) over the requested
/// tickers, optionally restricted to a date sub-window. Rows where any
/// requested column is non-finite are dropped before estimation.
pub fn build_covariance(
  matrix: &ReturnMatrix,
  tickers: &[String],
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
) -> Result<Vec<Vec<f64>>> {
  let missing = matrix.missing_symbols(tickers.iter().map(String::as_str));
  if !missing.is_empty() {
    return Err(QuantError::MissingAssets(missing));
  }

  let window = matrix.window(start, end);
  let columns: Vec<&[f64]> = tickers
    .iter()
    .map(|t| window.column(t).unwrap_or(&[]))
    .collect();

  let rows: Vec<usize> = (0..window.len())
    .filter(|&r| columns.iter().all(|c| c[r].is_finite()))
    .collect();
  if rows.len() < 2 {
    return Err(QuantError::invalid_input(
      "covariance window has fewer than two complete observations",
    ));
  }

  let k = tickers.len();
  let means: Vec<f64> = columns
    .iter()
    .map(|c| rows.iter().map(|&r| c[r]).sum::<f64>() / rows.len() as f64)
    .collect();

  let denom = (rows.len() - 1) as f64;
  let mut cov = vec![vec![0.0; k]; k];
  for i in 0..k {
    for j in i..k {
      let mut acc = 0.0;
      for &r in &rows {
        acc += (columns[i][r] - means[i]) * (columns[j][r] - means[j]);
      }
      let value = acc / denom * TRADING_DAYS;
      cov[i][j] = value;
      cov[j][i] = value;
    }
  }
  Ok(cov)
}
