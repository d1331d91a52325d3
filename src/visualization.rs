//! # Visualization
//!
//! $$
//! (P, \rho, \{(\sigma_k, \mu_k)\}, \tilde{\mathbf w}) \mapsto \text{HTML charts}
//! $$
//!
//! Plotly charts for a portfolio run: price history, return correlation,
//! efficient frontier and the cleaned weights.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use ndarray::ArrayView2;
use plotly::Bar;
use plotly::HeatMap;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;
use plotly::common::Font;
use plotly::common::Line;
use plotly::common::Marker;
use plotly::common::MarkerSymbol;
use plotly::common::Mode;
use plotly::layout::Annotation;
use plotly::layout::Axis;
use plotly::layout::Margin;

use crate::portfolio::data::PriceTable;
use crate::portfolio::data::correlation_matrix;
use crate::portfolio::engine::PortfolioReport;
use crate::portfolio::estimators::RiskReturnModel;
use crate::portfolio::types::PortfolioResult;
use crate::portfolio::types::WeightVector;

/// Weights at or below this share are left out of the weights chart.
const MIN_CHART_WEIGHT: f64 = 0.01;

/// One line per ticker over the table's dates.
pub fn price_history_plot(table: &PriceTable) -> Plot {
  let dates: Vec<String> = table
    .dates()
    .iter()
    .map(|d| d.format("%Y-%m-%d").to_string())
    .collect();

  let mut plot = Plot::new();
  for (j, ticker) in table.tickers().iter().enumerate() {
    let prices = table.prices().column(j).to_vec();
    plot.add_trace(
      Scatter::new(dates.clone(), prices)
        .mode(Mode::Lines)
        .name(ticker.as_str())
        .line(Line::new().width(1.2)),
    );
  }

  plot.set_layout(
    Layout::new()
      .title("Stock Prices")
      .x_axis(Axis::new().title("Date"))
      .y_axis(Axis::new().title("Close Price"))
      .margin(Margin::new().left(64).right(24).top(64).bottom(48)),
  );
  plot
}

/// Annotated heatmap of a correlation matrix.
pub fn correlation_heatmap(tickers: &[String], corr: ArrayView2<'_, f64>) -> Plot {
  let z: Vec<Vec<f64>> = corr.outer_iter().map(|row| row.to_vec()).collect();

  let mut annotations = Vec::with_capacity(tickers.len() * tickers.len());
  for (i, row_ticker) in tickers.iter().enumerate() {
    for (j, col_ticker) in tickers.iter().enumerate() {
      annotations.push(
        Annotation::new()
          .text(format!("{:.2}", corr[[i, j]]))
          .x(col_ticker.clone())
          .y(row_ticker.clone())
          .font(Font::new().size(10))
          .show_arrow(false),
      );
    }
  }

  let mut plot = Plot::new();
  plot.add_trace(HeatMap::new(tickers.to_vec(), tickers.to_vec(), z));
  plot.set_layout(
    Layout::new()
      .title("Correlation Matrix of Daily Returns")
      .annotations(annotations)
      .margin(Margin::new().left(80).right(24).top(64).bottom(80)),
  );
  plot
}

/// Frontier line with the individual assets and the max-Sharpe portfolio.
pub fn efficient_frontier_plot(
  frontier: &[PortfolioResult],
  model: &RiskReturnModel,
  optimal: &PortfolioResult,
) -> Plot {
  let mut plot = Plot::new();

  plot.add_trace(
    Scatter::new(
      frontier.iter().map(|p| p.volatility).collect(),
      frontier.iter().map(|p| p.expected_return).collect(),
    )
    .mode(Mode::Lines)
    .name("Efficient frontier"),
  );

  let asset_vol: Vec<f64> = (0..model.tickers.len())
    .map(|i| model.covariance[(i, i)].max(0.0).sqrt())
    .collect();
  plot.add_trace(
    Scatter::new(asset_vol, model.expected_returns.clone())
      .mode(Mode::MarkersText)
      .text_array(model.tickers.clone())
      .name("Assets"),
  );

  plot.add_trace(
    Scatter::new(vec![optimal.volatility], vec![optimal.expected_return])
      .mode(Mode::Markers)
      .marker(Marker::new().size(16).symbol(MarkerSymbol::Star))
      .name("Max Sharpe"),
  );

  plot.set_layout(
    Layout::new()
      .title("Efficient Frontier")
      .x_axis(Axis::new().title("Volatility"))
      .y_axis(Axis::new().title("Expected Return")),
  );
  plot
}

/// Bar chart of the weights above one percent.
pub fn weights_plot(weights: &WeightVector) -> Plot {
  let (tickers, values): (Vec<String>, Vec<f64>) = weights
    .iter()
    .filter(|(_, w)| *w > MIN_CHART_WEIGHT)
    .map(|(t, w)| (t.to_string(), w * 100.0))
    .unzip();

  let mut plot = Plot::new();
  plot.add_trace(Bar::new(tickers, values).name("Weight (%)"));
  plot.set_layout(
    Layout::new()
      .title("Optimized Portfolio Weights")
      .y_axis(Axis::new().title("Weight (%)")),
  );
  plot
}

/// Write `plot` as a standalone HTML file.
pub fn write_plot(plot: &Plot, path: &Path) -> anyhow::Result<()> {
  fs::write(path, plot.to_html()).with_context(|| format!("failed to write {}", path.display()))
}

/// Write every report chart into `dir`, returning the written paths.
///
/// The frontier chart is skipped when `frontier` is `None`.
pub fn write_report_charts(
  dir: &Path,
  table: &PriceTable,
  report: &PortfolioReport,
  frontier: Option<&[PortfolioResult]>,
) -> anyhow::Result<Vec<PathBuf>> {
  fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

  let corr = correlation_matrix(table.returns().view());
  let mut charts = vec![
    ("stock_prices.html", price_history_plot(table)),
    ("correlation_matrix.html", correlation_heatmap(table.tickers(), corr.view())),
    ("portfolio_weights.html", weights_plot(&report.cleaned)),
  ];
  if let Some(frontier) = frontier {
    charts.push((
      "efficient_frontier.html",
      efficient_frontier_plot(frontier, &report.model, &report.optimal),
    ));
  }

  let mut written = Vec::with_capacity(charts.len());
  for (name, plot) in charts {
    let path = dir.join(name);
    write_plot(&plot, &path)?;
    tracing::debug!(path = %path.display(), "wrote chart");
    written.push(path);
  }

  Ok(written)
}
