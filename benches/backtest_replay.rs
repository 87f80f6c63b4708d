use std::hint::black_box;
use std::time::Instant;

use chrono::NaiveDate;
use quantfolio_rs::backtest::BacktestConfig;
use quantfolio_rs::backtest::Backtester;
use quantfolio_rs::backtest::RebalancePolicy;
use quantfolio_rs::market::calendar;
use quantfolio_rs::market::ReturnMatrix;
use quantfolio_rs::portfolio::Weights;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

fn median_ms(samples: &mut [f64]) -> f64 {
  samples.sort_by(f64::total_cmp);
  samples[samples.len() / 2]
}

fn synthetic_matrix(n_days: usize, n_assets: usize) -> ReturnMatrix {
  let mut rng = StdRng::seed_from_u64(42);
  let dist = Normal::new(0.0004, 0.012).unwrap();

  let mut dates = vec![NaiveDate::from_ymd_opt(2015, 7, 1).unwrap()];
  while dates.len() < n_days {
    dates.push(calendar::next_business_day(*dates.last().unwrap()));
  }

  let columns = (0..n_assets)
    .map(|i| {
      let symbol = format!("A{i:02}");
      let series: Vec<f64> = (0..n_days).map(|_| dist.sample(&mut rng)).collect();
      (symbol, series)
    })
    .collect();

  ReturnMatrix::new(dates, columns).unwrap()
}

fn bench_replay(matrix: &ReturnMatrix, rebalance: RebalancePolicy, runs: usize) -> f64 {
  let config = BacktestConfig {
    start: matrix.dates()[0],
    end: *matrix.dates().last().unwrap(),
    rebalance,
    risk_free: 0.02,
    allow_short: false,
  };
  let backtester = Backtester::new(matrix, config);
  let weights = Weights::from_pairs(
    matrix
      .symbols()
      .iter()
      .map(|s| (s.clone(), 1.0 / matrix.symbols().len() as f64)),
  );

  let mut samples = Vec::with_capacity(runs);
  for _ in 0..runs {
    let start = Instant::now();
    let result = backtester.run(black_box(&weights), None);
    black_box(&result).as_ref().expect("replay succeeds");
    samples.push(start.elapsed().as_secs_f64() * 1e3);
  }
  median_ms(&mut samples)
}

fn main() {
  for &(n_days, n_assets) in &[(2_520usize, 4usize), (2_520, 16), (12_600, 16)] {
    let mut matrix = synthetic_matrix(n_days, n_assets);
    // The default benchmark sleeves must exist in the matrix.
    let spy = matrix.column("A00").unwrap().to_vec();
    let bnd = matrix.column("A01").unwrap().to_vec();
    let mut columns: Vec<(String, Vec<f64>)> = matrix
      .symbols()
      .iter()
      .map(|s| (s.clone(), matrix.column(s).unwrap().to_vec()))
      .collect();
    columns.push(("SPY".to_string(), spy));
    columns.push(("BND".to_string(), bnd));
    matrix = ReturnMatrix::new(matrix.dates().to_vec(), columns).unwrap();

    for &policy in &[RebalancePolicy::None, RebalancePolicy::Monthly] {
      let ms = bench_replay(&matrix, policy, 9);
      println!("replay {n_days:>6} days x {n_assets:>2} assets, {policy:?}: {ms:.3} ms");
    }
  }
}
