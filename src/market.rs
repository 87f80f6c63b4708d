//! # Market Data
//!
//! Aligned daily simple-return containers consumed by the forecasting,
//! optimization and backtesting engines. Alignment invariants are validated
//! once at construction; the engines treat the data as read-only afterwards.

pub mod calendar;

use chrono::NaiveDate;

use crate::error::QuantError;
use crate::error::Result;

fn validate_dates(dates: &[NaiveDate]) -> Result<()> {
  if dates.is_empty() {
    return Err(QuantError::invalid_input("date index is empty"));
  }
  for pair in dates.windows(2) {
    if pair[1] <= pair[0] {
      return Err(QuantError::invalid_input(format!(
        "date index must be strictly ascending: {} does not follow {}",
        pair[1], pair[0]
      )));
    }
  }
  Ok(())
}

/// A dated univariate daily simple-return series.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  dates: Vec<NaiveDate>,
  values: Vec<f64>,
}

impl ReturnSeries {
  /// Build a series from parallel date and value vectors.
  pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
    validate_dates(&dates)?;
    if dates.len() != values.len() {
      return Err(QuantError::invalid_input(format!(
        "series length mismatch: {} dates vs {} values",
        dates.len(),
        values.len()
      )));
    }
    Ok(Self { dates, values })
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn values(&self) -> &[f64] {
    &self.values
  }

  /// Last observation date of the series. `None` only for the empty halves a
  /// [`ReturnSeries::split`] can produce.
  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// Chronological train/test split: observations on or before `train_end` go
  /// to the first half, observations on or after `test_start` to the second.
  /// Rows strictly between the two cutoffs belong to neither half.
  pub fn split(&self, train_end: NaiveDate, test_start: NaiveDate) -> (ReturnSeries, ReturnSeries) {
    let train_len = self.dates.partition_point(|d| *d <= train_end);
    let test_from = self.dates.partition_point(|d| *d < test_start);
    let train = Self {
      dates: self.dates[..train_len].to_vec(),
      values: self.values[..train_len].to_vec(),
    };
    let test = Self {
      dates: self.dates[test_from..].to_vec(),
      values: self.values[test_from..].to_vec(),
    };
    (train, test)
  }
}

/// Ascending trading dates × per-symbol daily simple-return columns.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  columns: Vec<Vec<f64>>,
}

impl ReturnMatrix {
  /// Build a matrix from a shared date index and named columns.
  pub fn new(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
    validate_dates(&dates)?;
    if columns.is_empty() {
      return Err(QuantError::invalid_input("return matrix has no columns"));
    }
    let mut symbols = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());
    for (symbol, column) in columns {
      if column.len() != dates.len() {
        return Err(QuantError::invalid_input(format!(
          "column {} has {} rows, date index has {}",
          symbol,
          column.len(),
          dates.len()
        )));
      }
      if symbols.contains(&symbol) {
        return Err(QuantError::invalid_input(format!("duplicate column {}", symbol)));
      }
      symbols.push(symbol);
      values.push(column);
    }
    Ok(Self {
      dates,
      symbols,
      columns: values,
    })
  }

  /// Number of trading rows.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn contains(&self, symbol: &str) -> bool {
    self.symbols.iter().any(|s| s == symbol)
  }

  /// Borrow one return column.
  pub fn column(&self, symbol: &str) -> Option<&[f64]> {
    let idx = self.symbols.iter().position(|s| s == symbol)?;
    Some(&self.columns[idx])
  }

  /// Clone one column out as a dated series.
  pub fn series(&self, symbol: &str) -> Option<ReturnSeries> {
    self.column(symbol).map(|values| ReturnSeries {
      dates: self.dates.clone(),
      values: values.to_vec(),
    })
  }

  /// Every requested symbol absent from this matrix, in request order.
  pub fn missing_symbols<'a>(&self, requested: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    requested
      .into_iter()
      .filter(|symbol| !self.contains(symbol))
      .map(|symbol| symbol.to_string())
      .collect()
  }

  /// Restrict rows to the inclusive `[start, end]` window; `None` leaves the
  /// corresponding side unbounded.
  pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> ReturnMatrix {
    let from = match start {
      Some(s) => self.dates.partition_point(|d| *d < s),
      None => 0,
    };
    let to = match end {
      Some(e) => self.dates.partition_point(|d| *d <= e),
      None => self.dates.len(),
    };
    let to = to.max(from);
    ReturnMatrix {
      dates: self.dates[from..to].to_vec(),
      symbols: self.symbols.clone(),
      columns: self.columns.iter().map(|c| c[from..to].to_vec()).collect(),
    }
  }
}
