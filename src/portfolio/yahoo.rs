//! # Yahoo Finance Downloader
//!
//! $$
//! (T_1,\dots,T_n,\ [d_0, d_1]) \longmapsto P_{t,i} = \text{adjclose}_{T_i}(t)
//! $$
//!
//! Daily adjusted closes from Yahoo Finance, joined on date. A date missing for
//! any ticker is dropped from the table.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::DateTime;
use chrono::NaiveDate;
use time::Month;
use time::OffsetDateTime;
use yahoo_finance_api::YahooConnector;

use super::data::PriceTable;

fn to_offset(date: NaiveDate) -> anyhow::Result<OffsetDateTime> {
  use chrono::Datelike;

  let month = Month::try_from(date.month() as u8)?;
  let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)?;
  Ok(day.midnight().assume_utc())
}

/// Download daily prices for `tickers` between `start` and `end` (inclusive).
pub fn download_prices(
  tickers: &[String],
  start: NaiveDate,
  end: NaiveDate,
) -> anyhow::Result<PriceTable> {
  let provider = YahooConnector::new().context("failed to create Yahoo Finance client")?;
  let from = to_offset(start)?;
  let to = to_offset(end.succ_opt().unwrap_or(end))?;

  let n = tickers.len();
  let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();

  for (j, ticker) in tickers.iter().enumerate() {
    let response = provider
      .get_quote_history(ticker, from, to)
      .with_context(|| format!("failed to download {ticker}"))?;
    let quotes = response
      .quotes()
      .with_context(|| format!("no quotes for {ticker}"))?;

    tracing::info!(%ticker, quotes = quotes.len(), "downloaded price history");

    for q in quotes {
      let Some(ts) = DateTime::from_timestamp(q.timestamp as i64, 0) else {
        tracing::warn!(%ticker, timestamp = q.timestamp, "skipping quote with bad timestamp");
        continue;
      };
      by_date.entry(ts.date_naive()).or_insert_with(|| vec![None; n])[j] = Some(q.adjclose);
    }
  }

  let table = PriceTable::from_observations(tickers.to_vec(), by_date.into_iter().collect())?;
  Ok(table)
}
