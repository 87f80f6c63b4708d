//! # Forecasting
//!
//! ARIMA-family return forecasting: bounded grid order selection with a
//! convergence retry, conditional-sum-of-squares fitting, and multi-step
//! mean/interval forecasts re-indexed onto future trading days with price
//! paths reconstructed by compounding.
//!
//! Fitting and forecasting are two pure phases: [`Forecaster::fit`] returns
//! an immutable [`FittedModel`], [`Forecaster::forecast`] consumes one.
//! [`Forecaster::run`] wires the phases together for callers that hold only a
//! training series.

pub mod arima;
pub mod selection;

use std::fmt;

use chrono::NaiveDate;
use ndarray::Array1;
use serde::Deserialize;
use serde::Serialize;

pub use arima::FittedModel;
pub use arima::ForecastBands;
pub use selection::CandidateOutcome;
pub use selection::ModelSelection;
pub use selection::FALLBACK_ORDER;

use crate::error::QuantError;
use crate::error::Result;
use crate::market::calendar;
use crate::market::ReturnSeries;

/// Autoregressive, differencing and moving-average orders of one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelOrder {
  pub p: usize,
  pub d: usize,
  pub q: usize,
}

impl fmt::Display for ModelOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({},{},{})", self.p, self.d, self.q)
  }
}

/// Exclusive upper bounds of the (p, d, q) candidate grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGrid {
  pub p_max: usize,
  pub d_max: usize,
  pub q_max: usize,
}

impl Default for OrderGrid {
  fn default() -> Self {
    Self {
      p_max: 4,
      d_max: 2,
      q_max: 4,
    }
  }
}

impl OrderGrid {
  /// Every candidate order in ascending (p, then d, then q) order.
  pub fn orders(&self) -> Vec<ModelOrder> {
    let mut orders = Vec::with_capacity(self.p_max * self.d_max * self.q_max);
    for p in 0..self.p_max {
      for d in 0..self.d_max {
        for q in 0..self.q_max {
          orders.push(ModelOrder { p, d, q });
        }
      }
    }
    orders
  }
}

/// Mean assumption of the fitted process. Returns are near zero-mean, so the
/// default carries no constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
  #[default]
  None,
  Constant,
}

/// Forecast request configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
  /// Number of business days to forecast. Defaults to ~6 trading months.
  pub steps: usize,
  /// Two-sided interval tail mass.
  pub alpha: f64,
  /// Mean assumption of the fitted process.
  pub trend: Trend,
  /// Pinned order; `None` lets the grid search choose.
  pub order: Option<ModelOrder>,
  /// Candidate grid for order selection.
  pub grid: OrderGrid,
  /// Optimizer iteration budget per candidate fit.
  pub max_iters: u64,
}

impl Default for ForecastRequest {
  fn default() -> Self {
    Self {
      steps: 126,
      alpha: 0.05,
      trend: Trend::None,
      order: None,
      grid: OrderGrid::default(),
      max_iters: 200,
    }
  }
}

/// Future-dated return forecast with reconstructed price paths.
///
/// Prices compound each return path independently from the supplied last
/// price, so the price band is an informal envelope, not a calibrated
/// interval; downstream consumers depend on exactly this band width.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastPath {
  /// The next `steps` business days strictly after the training window.
  pub dates: Vec<NaiveDate>,
  pub ret_mean: Vec<f64>,
  pub ret_lower: Vec<f64>,
  pub ret_upper: Vec<f64>,
  pub price_mean: Vec<f64>,
  pub price_lower: Vec<f64>,
  pub price_upper: Vec<f64>,
  /// Order the forecast was produced with.
  pub order: ModelOrder,
}

/// Two-phase forecasting front end over the ARIMA engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Forecaster {
  pub request: ForecastRequest,
}

impl Forecaster {
  pub fn new(request: ForecastRequest) -> Self {
    Self { request }
  }

  /// Fit a model on raw return values: grid-select an order (unless one is
  /// pinned on the request), then fit at the winner with the same retry
  /// policy the search uses. Non-finite observations are dropped first.
  pub fn fit_values(&self, values: &[f64]) -> Result<FittedModel> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if clean.is_empty() {
      return Err(QuantError::invalid_input("training series has no finite observations"));
    }
    let y = Array1::from(clean);

    let order = match self.request.order {
      Some(order) => order,
      None => selection::select_order(&y, &self.request.grid, self.request.trend, self.request.max_iters)?.order,
    };

    selection::fit_with_retry(&y, order, self.request.trend, self.request.max_iters)
      .map_err(|_| QuantError::ModelFitFailure)
  }

  /// Fit a model on a dated return series.
  pub fn fit(&self, series: &ReturnSeries) -> Result<FittedModel> {
    self.fit_values(series.values())
  }

  /// Pure forecast from a fitted model: mean and interval return paths on the
  /// next business days strictly after `last_train_date`, plus price paths
  /// compounded independently from `last_price`.
  pub fn forecast(
    &self,
    model: &FittedModel,
    last_train_date: NaiveDate,
    last_price: f64,
  ) -> Result<ForecastPath> {
    let bands = arima::forecast_with_interval(model, self.request.steps, self.request.alpha)?;
    let dates = calendar::business_days_after(last_train_date, self.request.steps);

    Ok(ForecastPath {
      dates,
      price_mean: compound_prices(last_price, &bands.mean),
      price_lower: compound_prices(last_price, &bands.lower),
      price_upper: compound_prices(last_price, &bands.upper),
      ret_mean: bands.mean,
      ret_lower: bands.lower,
      ret_upper: bands.upper,
      order: model.order,
    })
  }

  /// Orchestrated entry point: use the supplied model, or fit one implicitly
  /// from the training series. With neither, the request fails with
  /// [`QuantError::NotFitted`].
  pub fn run(
    &self,
    model: Option<&FittedModel>,
    train: Option<&ReturnSeries>,
    last_price: f64,
  ) -> Result<ForecastPath> {
    let fitted;
    let model = match (model, train) {
      (Some(m), _) => m,
      (None, Some(series)) => {
        fitted = self.fit(series)?;
        &fitted
      }
      (None, None) => return Err(QuantError::NotFitted),
    };

    let last_train_date = train
      .and_then(|series| series.last_date())
      .ok_or_else(|| QuantError::invalid_input("a training series is required to anchor forecast dates"))?;

    self.forecast(model, last_train_date, last_price)
  }
}

/// Price path reconstruction: `last_price * Π (1 + r_i)`.
fn compound_prices(last_price: f64, returns: &[f64]) -> Vec<f64> {
  let mut prices = Vec::with_capacity(returns.len());
  let mut level = last_price;
  for r in returns {
    level *= 1.0 + r;
    prices.push(level);
  }
  prices
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal as GaussianNoise;

  use super::*;
  use crate::market::calendar::is_business_day;
  use crate::metrics;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn ar1_values(phi: f64, sigma: f64, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = GaussianNoise::new(0.0, sigma).unwrap();
    let mut y = vec![0.0];
    for _ in 1..n {
      let prev = *y.last().unwrap();
      y.push(phi * prev + noise.sample(&mut rng));
    }
    y
  }

  fn business_dates(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut dates = vec![start];
    while dates.len() < n {
      let next = calendar::next_business_day(*dates.last().unwrap());
      dates.push(next);
    }
    dates
  }

  #[test]
  fn grid_orders_are_ascending_and_complete() {
    let grid = OrderGrid::default();
    let orders = grid.orders();
    assert_eq!(orders.len(), 4 * 2 * 4);
    assert!(orders.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(orders[0], ModelOrder { p: 0, d: 0, q: 0 });
  }

  #[test]
  fn run_without_model_or_series_is_not_fitted() {
    let forecaster = Forecaster::default();
    let result = forecaster.run(None, None, 100.0);
    assert!(matches!(result, Err(QuantError::NotFitted)));
  }

  #[test]
  fn forecast_dates_are_future_business_days() {
    let request = ForecastRequest {
      steps: 10,
      order: Some(ModelOrder { p: 1, d: 0, q: 0 }),
      ..ForecastRequest::default()
    };
    let forecaster = Forecaster::new(request);
    let values = ar1_values(0.4, 0.01, 200, 1);
    let model = forecaster.fit_values(&values).unwrap();

    // 2024-03-01 is a Friday; the forecast must start on the following Monday.
    let path = forecaster.forecast(&model, d(2024, 3, 1), 100.0).unwrap();
    assert_eq!(path.dates.len(), 10);
    assert_eq!(path.dates[0], d(2024, 3, 4));
    assert!(path.dates.iter().all(|day| is_business_day(*day)));
    assert!(path.dates.iter().all(|day| *day > d(2024, 3, 1)));
  }

  #[test]
  fn price_paths_compound_each_band_independently() {
    let request = ForecastRequest {
      steps: 5,
      order: Some(ModelOrder { p: 1, d: 0, q: 0 }),
      ..ForecastRequest::default()
    };
    let forecaster = Forecaster::new(request);
    let values = ar1_values(0.5, 0.01, 200, 2);
    let model = forecaster.fit_values(&values).unwrap();
    let path = forecaster.forecast(&model, d(2024, 3, 1), 250.0).unwrap();

    let mut level = 250.0;
    for (step, r) in path.ret_mean.iter().enumerate() {
      level *= 1.0 + r;
      assert_relative_eq!(path.price_mean[step], level, epsilon = 1e-9);
    }
    for step in 0..path.dates.len() {
      assert!(path.price_lower[step] <= path.price_mean[step]);
      assert!(path.price_mean[step] <= path.price_upper[step]);
    }
  }

  #[test]
  fn implicit_fit_matches_explicit_fit() {
    let request = ForecastRequest {
      steps: 8,
      order: Some(ModelOrder { p: 1, d: 0, q: 0 }),
      ..ForecastRequest::default()
    };
    let forecaster = Forecaster::new(request);
    let values = ar1_values(0.6, 0.01, 150, 3);
    let dates = business_dates(d(2023, 1, 2), values.len());
    let series = ReturnSeries::new(dates, values).unwrap();

    let model = forecaster.fit(&series).unwrap();
    let explicit = forecaster
      .forecast(&model, series.last_date().unwrap(), 50.0)
      .unwrap();
    let implicit = forecaster.run(None, Some(&series), 50.0).unwrap();
    assert_eq!(explicit, implicit);
  }

  #[test]
  fn pinned_order_bypasses_the_grid() {
    let pinned = ModelOrder { p: 2, d: 0, q: 1 };
    let request = ForecastRequest {
      order: Some(pinned),
      ..ForecastRequest::default()
    };
    let forecaster = Forecaster::new(request);
    let values = ar1_values(0.5, 0.02, 300, 4);
    let model = forecaster.fit_values(&values).unwrap();
    assert_eq!(model.order, pinned);
  }

  #[test]
  fn ar1_holdout_rmse_is_bounded() {
    // Seeded AR(1), phi = 0.7, n = 300, sigma = 1, scored against a held-out
    // continuation of the same process.
    let values = ar1_values(0.7, 1.0, 300, 0);
    let (train, test) = values.split_at(250);

    let request = ForecastRequest {
      steps: 50,
      grid: OrderGrid {
        p_max: 3,
        d_max: 2,
        q_max: 3,
      },
      ..ForecastRequest::default()
    };
    let forecaster = Forecaster::new(request);
    let model = forecaster.fit_values(train).unwrap();
    assert!(model.order.p >= 1);

    let path = forecaster.forecast(&model, d(2024, 1, 5), 100.0).unwrap();
    let rmse = metrics::rmse(test, &path.ret_mean);
    assert!(rmse.is_finite());

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sd = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt();
    assert!(rmse < 2.0 * sd, "holdout rmse {} vs unconditional sd {}", rmse, sd);
  }
}
