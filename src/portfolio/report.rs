//! # Allocation Report
//!
//! $$
//! V_i = n_i\,p_i,\qquad \sum_i V_i + \text{cash} = B
//! $$
//!
//! Tabular breakdown of an allocation plan, rendered to the console and
//! exported as CSV.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use prettytable::Table;
use prettytable::row;
use serde::Deserialize;
use serde::Serialize;

use super::discrete::AllocationPlan;
use super::types::PortfolioResult;
use super::types::WeightVector;

/// Label of the synthetic leftover-cash row.
pub const CASH_TICKER: &str = "CASH";

/// One line of the allocation breakdown. The cash row has no share count or
/// unit price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
  #[serde(rename = "Ticker")]
  pub ticker: String,
  #[serde(rename = "Shares")]
  pub shares: Option<u64>,
  #[serde(rename = "Price per Share")]
  pub price: Option<f64>,
  #[serde(rename = "Total Value")]
  pub total_value: f64,
}

/// Held positions sorted by value (largest first), then the cash row.
pub fn breakdown(plan: &AllocationPlan, latest_prices: &HashMap<String, f64>) -> Vec<ReportRow> {
  let mut rows: Vec<ReportRow> = plan
    .shares
    .iter()
    .filter(|(_, s)| *s > 0)
    .filter_map(|(ticker, shares)| {
      let price = latest_prices.get(ticker).copied()?;
      Some(ReportRow {
        ticker: ticker.clone(),
        shares: Some(*shares),
        price: Some(price),
        total_value: *shares as f64 * price,
      })
    })
    .collect();

  rows.sort_by(|a, b| {
    b.total_value
      .total_cmp(&a.total_value)
      .then_with(|| a.ticker.cmp(&b.ticker))
  });

  rows.push(ReportRow {
    ticker: CASH_TICKER.to_string(),
    shares: None,
    price: None,
    total_value: plan.leftover_cash,
  });

  rows
}

pub fn weights_table(weights: &WeightVector) -> Table {
  let mut table = Table::new();
  table.set_titles(row!["Ticker", "Weight"]);
  for (ticker, w) in weights.iter() {
    table.add_row(row![ticker, r->format!("{:.2}%", w * 100.0)]);
  }
  table
}

pub fn performance_table(result: &PortfolioResult) -> Table {
  let mut table = Table::new();
  table.set_titles(row!["Metric", "Value"]);
  table.add_row(row![
    "Expected annual return",
    r->format!("{:.2}%", result.expected_return * 100.0)
  ]);
  table.add_row(row![
    "Annual volatility",
    r->format!("{:.2}%", result.volatility * 100.0)
  ]);
  table.add_row(row!["Sharpe ratio", r->format!("{:.2}", result.sharpe)]);
  table
}

pub fn allocation_table(rows: &[ReportRow]) -> Table {
  let mut table = Table::new();
  table.set_titles(row!["Ticker", "Shares", "Price per Share", "Total Value"]);
  for line in rows {
    let shares = line.shares.map(|s| s.to_string()).unwrap_or_default();
    let price = line.price.map(|p| format!("{p:.2}")).unwrap_or_default();
    table.add_row(row![
      line.ticker,
      r->shares,
      r->price,
      r->format!("{:.2}", line.total_value)
    ]);
  }
  table
}

/// Write `rows` as CSV with a header line.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> anyhow::Result<()> {
  let mut wtr = csv::Writer::from_writer(writer);
  for r in rows {
    wtr.serialize(r)?;
  }
  wtr.flush()?;
  Ok(())
}

pub fn write_csv_file(rows: &[ReportRow], path: &Path) -> anyhow::Result<()> {
  let file =
    File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
  write_csv(rows, file).with_context(|| format!("failed to write {}", path.display()))?;
  tracing::info!(path = %path.display(), rows = rows.len(), "wrote allocation summary");
  Ok(())
}
