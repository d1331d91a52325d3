use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use portfolio_rs::portfolio::PortfolioEngine;
use portfolio_rs::portfolio::PortfolioEngineConfig;
use portfolio_rs::portfolio::PriceTable;
use portfolio_rs::portfolio::RiskModel;
use portfolio_rs::portfolio::load_price_csv;
use portfolio_rs::portfolio::report::allocation_table;
use portfolio_rs::portfolio::report::performance_table;
use portfolio_rs::portfolio::report::weights_table;
use portfolio_rs::portfolio::report::write_csv_file;
use portfolio_rs::visualization::write_report_charts;

const DEFAULT_TICKERS: &str = "AAPL,MSFT,NVDA,TSLA,GOOGL,AMD,META,TSM,ASML,INTC";

/// Max-Sharpe portfolio with a whole-share allocation of a cash budget.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Wide CSV of closing prices (`Date,T1,T2,...`)
  #[arg(long)]
  prices: Option<PathBuf>,

  /// Comma-separated tickers
  #[arg(long, value_delimiter = ',', default_value = DEFAULT_TICKERS)]
  tickers: Vec<String>,

  /// First date of the price history (downloads only)
  #[arg(long, default_value = "2015-01-01")]
  start: NaiveDate,

  /// Last date of the price history, defaults to today (downloads only)
  #[arg(long)]
  end: Option<NaiveDate>,

  /// Cash to allocate
  #[arg(long, default_value_t = 20_000.0)]
  budget: f64,

  /// Minimum weight per asset
  #[arg(long, default_value_t = 0.02)]
  lower: f64,

  /// Maximum weight per asset
  #[arg(long, default_value_t = 0.19)]
  upper: f64,

  /// Annual risk-free rate
  #[arg(long, default_value_t = 0.0)]
  risk_free: f64,

  /// Covariance estimator: `sample` or `ledoit-wolf`
  #[arg(long, default_value = "sample")]
  risk_model: String,

  /// Directory for the CSV summary and charts
  #[arg(long, default_value = ".")]
  output_dir: PathBuf,

  /// Skip the HTML charts
  #[arg(long)]
  no_plots: bool,
}

fn load_prices(args: &Args) -> anyhow::Result<PriceTable> {
  if let Some(path) = &args.prices {
    return load_price_csv(path, Some(&args.tickers));
  }

  #[cfg(feature = "yahoo")]
  {
    let end = args
      .end
      .unwrap_or_else(|| chrono::Local::now().date_naive());
    portfolio_rs::portfolio::download_prices(&args.tickers, args.start, end)
  }

  #[cfg(not(feature = "yahoo"))]
  {
    anyhow::bail!("no price source: pass --prices <CSV> or build with the `yahoo` feature")
  }
}

fn main() -> anyhow::Result<()> {
  env_logger::init();
  let args = Args::parse();

  let risk_model = RiskModel::parse(&args.risk_model).unwrap_or_else(|| {
    tracing::warn!(
      risk_model = %args.risk_model,
      "unknown risk model, using the sample covariance"
    );
    RiskModel::SampleCov
  });

  let config = PortfolioEngineConfig {
    risk_model,
    lower_bound: args.lower,
    upper_bound: args.upper,
    risk_free: args.risk_free,
    budget: args.budget,
    ..Default::default()
  };
  let engine = PortfolioEngine::new(config);

  let table = load_prices(&args)?;
  println!(
    "Loaded {} observations for {} tickers ({} to {})",
    table.n_observations(),
    table.n_assets(),
    table.dates().first().map(|d| d.to_string()).unwrap_or_default(),
    table.dates().last().map(|d| d.to_string()).unwrap_or_default(),
  );

  let report = engine.run(&table).context("portfolio run failed")?;

  println!("\nOptimized Portfolio Weights:");
  weights_table(&report.cleaned).printstd();
  println!("\nPortfolio Performance:");
  performance_table(&report.optimal).printstd();
  println!("\nDiscrete Allocation (budget {:.2}):", report.allocation.budget);
  allocation_table(&report.rows).printstd();
  println!("Funds remaining: ${:.2}", report.allocation.leftover_cash);

  std::fs::create_dir_all(&args.output_dir)
    .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
  let csv_path = args.output_dir.join("portfolio_allocation_summary.csv");
  write_csv_file(&report.rows, &csv_path)?;
  println!("Allocation summary written to {}", csv_path.display());

  if !args.no_plots {
    let frontier = match engine.frontier(&report.model) {
      Ok(f) => Some(f),
      Err(e) => {
        tracing::warn!(error = %e, "efficient frontier unavailable, skipping chart");
        None
      }
    };
    let written = write_report_charts(&args.output_dir, &table, &report, frontier.as_deref())?;
    for path in written {
      println!("Chart written to {}", path.display());
    }
  }

  Ok(())
}
