//! # Price Loaders
//!
//! $$
//! \texttt{Date},T_1,\dots,T_n \ \longmapsto\ P\in\mathbb R^{T\times n}
//! $$
//!
//! Wide-format CSV price history. Empty, `NaN` or `null` cells are gaps; rows
//! with a gap are dropped by [`PriceTable::from_observations`].

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use chrono::NaiveDate;

use super::data::PriceTable;

/// Load a wide CSV file, optionally restricted to `tickers` (in that order).
pub fn load_price_csv(path: &Path, tickers: Option<&[String]>) -> anyhow::Result<PriceTable> {
  let file = std::fs::File::open(path)
    .with_context(|| format!("failed to open price file {}", path.display()))?;
  read_price_csv(file, tickers).with_context(|| format!("failed to load {}", path.display()))
}

pub fn read_price_csv<R: Read>(reader: R, tickers: Option<&[String]>) -> anyhow::Result<PriceTable> {
  let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
  let headers = rdr.headers()?.clone();
  if headers.len() < 2 {
    bail!("price file needs a date column and at least one ticker column");
  }

  let available: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
  let (names, columns): (Vec<String>, Vec<usize>) = match tickers {
    Some(wanted) => wanted
      .iter()
      .map(|t| {
        available
          .iter()
          .position(|a| a == t)
          .map(|j| (t.clone(), j + 1))
          .ok_or_else(|| anyhow!("ticker {t} not found in price file"))
      })
      .collect::<anyhow::Result<Vec<_>>>()?
      .into_iter()
      .unzip(),
    None => available
      .into_iter()
      .enumerate()
      .map(|(j, t)| (t, j + 1))
      .unzip(),
  };

  let mut rows = Vec::new();
  for (line, record) in rdr.records().enumerate() {
    let record = record?;
    let raw_date = record.get(0).unwrap_or_default();
    let date = parse_date(raw_date)
      .with_context(|| format!("bad date {raw_date:?} on data line {}", line + 1))?;

    let values = columns
      .iter()
      .map(|&j| parse_price(record.get(j).unwrap_or_default()))
      .collect::<anyhow::Result<Vec<_>>>()
      .with_context(|| format!("bad price on data line {}", line + 1))?;

    rows.push((date, values));
  }

  let table = PriceTable::from_observations(names, rows)?;
  tracing::info!(
    assets = table.n_assets(),
    observations = table.n_observations(),
    "loaded price history"
  );
  Ok(table)
}

/// `YYYY-MM-DD`, also accepting a trailing time component.
fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d"))
    .map_err(Into::into)
}

fn parse_price(s: &str) -> anyhow::Result<Option<f64>> {
  if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
    return Ok(None);
  }
  let p: f64 = s.parse().with_context(|| format!("{s:?} is not a number"))?;
  Ok(Some(p).filter(|p| p.is_finite()))
}
