use approx::assert_relative_eq;
use chrono::Duration;
use chrono::NaiveDate;
use ndarray::Array2;
use portfolio_rs::PortfolioError;
use portfolio_rs::portfolio::PortfolioEngine;
use portfolio_rs::portfolio::PortfolioEngineConfig;
use portfolio_rs::portfolio::PriceTable;
use portfolio_rs::portfolio::RiskModel;
use portfolio_rs::portfolio::loaders::read_price_csv;
use portfolio_rs::portfolio::report::ReportRow;
use portfolio_rs::portfolio::report::write_csv;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;

const TICKERS: [&str; 10] = [
  "AAPL", "MSFT", "NVDA", "TSLA", "GOOGL", "AMD", "META", "TSM", "ASML", "INTC",
];

/// Correlated geometric Brownian motion paths, one column per ticker.
fn synthetic_table(seed: u64, n_days: usize) -> PriceTable {
  let mut rng = StdRng::seed_from_u64(seed);
  let noise = Normal::new(0.0, 1.0).unwrap();
  let dt = 1.0 / 252.0;

  let drifts: Vec<f64> = (0..TICKERS.len()).map(|i| 0.03 + 0.02 * i as f64).collect();
  let vols: Vec<f64> = (0..TICKERS.len()).map(|i| 0.18 + 0.025 * i as f64).collect();

  let mut prices = Array2::zeros((n_days, TICKERS.len()));
  let mut level: Vec<f64> = (0..TICKERS.len()).map(|i| 50.0 + 40.0 * i as f64).collect();
  for t in 0..n_days {
    let market: f64 = noise.sample(&mut rng);
    for j in 0..TICKERS.len() {
      if t > 0 {
        let shock = 0.5 * market + (0.75f64).sqrt() * noise.sample(&mut rng);
        let sigma = vols[j];
        level[j] *= ((drifts[j] - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * shock).exp();
      }
      prices[[t, j]] = level[j];
    }
  }

  let start = NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
  let dates = (0..n_days).map(|i| start + Duration::days(i as i64)).collect();
  PriceTable::new(TICKERS.iter().map(|t| t.to_string()).collect(), dates, prices).unwrap()
}

#[test]
fn default_run_respects_bounds_and_budget() {
  let table = synthetic_table(7, 750);
  let engine = PortfolioEngine::new(PortfolioEngineConfig::default());

  let report = engine.run(&table).unwrap();

  let weights = &report.optimal.weights;
  assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
  for &w in weights {
    assert!((0.02 - 1e-6..=0.19 + 1e-6).contains(&w), "weight {w} out of bounds");
  }

  let plan = &report.allocation;
  assert!(plan.leftover_cash >= 0.0);
  assert_relative_eq!(
    plan.invested(&report.latest_prices) + plan.leftover_cash,
    20_000.0,
    epsilon = 1e-6
  );
  for (ticker, _) in report.cleaned.iter() {
    assert!(plan.leftover_cash < report.latest_prices[ticker]);
  }
}

#[test]
fn identical_inputs_give_identical_weights() {
  let table = synthetic_table(11, 500);
  let engine = PortfolioEngine::new(PortfolioEngineConfig::default());

  let a = engine.optimize(&engine.estimate(&table).unwrap()).unwrap();
  let b = engine.optimize(&engine.estimate(&table).unwrap()).unwrap();

  assert_eq!(a.weights, b.weights);
}

#[test]
fn shrinkage_model_also_solves() {
  let table = synthetic_table(3, 400);
  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    risk_model: RiskModel::LedoitWolf,
    ..Default::default()
  });

  let report = engine.run(&table).unwrap();
  assert_relative_eq!(report.optimal.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
}

#[test]
fn frontier_brackets_the_tangency_portfolio() {
  let table = synthetic_table(5, 600);
  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    frontier_points: 12,
    ..Default::default()
  });

  let model = engine.estimate(&table).unwrap();
  let frontier = engine.frontier(&model).unwrap();
  let tangency = engine.optimize(&model).unwrap();

  assert_eq!(frontier.len(), 12);
  assert!(frontier[0].volatility <= tangency.volatility + 1e-6);
  let best_sharpe = frontier.iter().map(|p| p.sharpe).fold(f64::MIN, f64::max);
  assert!(tangency.sharpe >= best_sharpe - 1e-4);
}

#[test]
fn too_few_instruments_for_the_caps_is_infeasible() {
  let table = synthetic_table(1, 100);
  let subset: Vec<String> = TICKERS[..5].iter().map(|t| t.to_string()).collect();
  let narrow = PriceTable::new(
    subset,
    table.dates().to_vec(),
    table.prices().slice(ndarray::s![.., ..5]).to_owned(),
  )
  .unwrap();

  let engine = PortfolioEngine::new(PortfolioEngineConfig::default());
  match engine.run(&narrow) {
    Err(PortfolioError::InfeasibleConstraints {
      lower_sum,
      upper_sum,
    }) => {
      assert_relative_eq!(lower_sum, 0.1, epsilon = 1e-12);
      assert_relative_eq!(upper_sum, 0.95, epsilon = 1e-12);
    }
    other => panic!("expected infeasible constraints, got {other:?}"),
  }
}

#[test]
fn csv_in_report_out() {
  let mut text = String::from("Date,AAA,BBB,CCC\n");
  let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
  for i in 0..120 {
    let x = i as f64;
    let ccc = if i == 50 {
      String::new()
    } else {
      format!("{:.4}", 30.0 + 0.1 * x + (x * 0.9).cos())
    };
    text.push_str(&format!(
      "{},{:.4},{:.4},{}\n",
      start + Duration::days(i),
      100.0 + 0.3 * x + 2.0 * (x * 0.5).sin(),
      50.0 + 0.05 * x + 1.5 * (x * 0.7).sin(),
      ccc,
    ));
  }

  let table = read_price_csv(text.as_bytes(), None).unwrap();
  assert_eq!(table.n_observations(), 119);

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    lower_bound: 0.1,
    upper_bound: 0.8,
    budget: 5_000.0,
    ..Default::default()
  });
  let report = engine.run(&table).unwrap();

  let mut buf = Vec::new();
  write_csv(&report.rows, &mut buf).unwrap();
  let mut rdr = csv::Reader::from_reader(buf.as_slice());
  let rows: Vec<ReportRow> = rdr.deserialize().collect::<Result<_, _>>().unwrap();

  assert_eq!(rows, report.rows);
  assert_eq!(rows.last().unwrap().ticker, "CASH");
  let values: Vec<f64> = rows[..rows.len() - 1].iter().map(|r| r.total_value).collect();
  assert!(values.windows(2).all(|w| w[0] >= w[1]));

  let total: f64 = rows.iter().map(|r| r.total_value).sum();
  assert_relative_eq!(total, 5_000.0, epsilon = 1e-6);
}
