//! # Discrete Allocation
//!
//! $$
//! \min_{s\in\mathbb N^n}\ \sum_i (w_iB - s_ip_i)^2
//! \quad\text{s.t.}\quad \sum_i s_ip_i \le B
//! $$
//!
//! Converts continuous weights into whole shares under a cash budget. Starts
//! from the floor allocation, then repeatedly buys the single share that most
//! reduces the squared dollar deviation from target.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::collections::HashSet;

use ordered_float::OrderedFloat;

use crate::error::PortfolioError;
use crate::error::Result;
use super::types::WeightVector;

const PRICE_EPS: f64 = 1e-9;

/// Whole-share holdings plus uninvested cash.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationPlan {
  /// Shares per instrument, in the order of the weights that produced them.
  pub shares: Vec<(String, u64)>,
  pub leftover_cash: f64,
  pub budget: f64,
}

impl AllocationPlan {
  /// Shares held in `ticker` (zero if absent).
  pub fn shares_of(&self, ticker: &str) -> u64 {
    self
      .shares
      .iter()
      .find(|(t, _)| t == ticker)
      .map_or(0, |(_, s)| *s)
  }

  /// Dollar amount invested at the given prices.
  pub fn invested(&self, prices: &HashMap<String, f64>) -> f64 {
    self
      .shares
      .iter()
      .filter(|(_, s)| *s > 0)
      .map(|(t, s)| *s as f64 * prices.get(t).copied().unwrap_or(0.0))
      .sum()
  }
}

struct Target {
  ticker: String,
  price: f64,
  target: f64,
  shares: u64,
}

impl Target {
  fn value(&self) -> f64 {
    self.shares as f64 * self.price
  }

  /// Reduction in `(target - value)^2` from buying one more share.
  fn score(&self) -> f64 {
    let gap = self.target - self.value();
    2.0 * gap * self.price - self.price * self.price
  }
}

/// Allocate `budget` across `weights` at `latest_prices`.
///
/// Only long positions are supported. Zero weights are skipped entirely and
/// reported with zero shares. Tickers must be unique.
///
/// Once an instrument leads the runner-up by several purchases, those shares
/// are bought in one step. Weights summing well below one leave a surplus
/// that is still spent share by share whenever several instruments compete
/// for it.
pub fn allocate(
  weights: &WeightVector,
  latest_prices: &HashMap<String, f64>,
  budget: f64,
) -> Result<AllocationPlan> {
  if !(budget.is_finite() && budget >= 0.0) {
    return Err(PortfolioError::InvalidArgument(format!(
      "budget must be finite and non-negative, got {budget}"
    )));
  }

  let mut seen = HashSet::with_capacity(weights.len());
  if let Some((dup, _)) = weights.iter().find(|(t, _)| !seen.insert(*t)) {
    return Err(PortfolioError::DuplicateTicker(dup.to_string()));
  }

  let mut targets = Vec::with_capacity(weights.len());
  let mut skipped = Vec::new();
  for (ticker, w) in weights.iter() {
    if !w.is_finite() || w < 0.0 {
      return Err(PortfolioError::InvalidArgument(format!(
        "weight for {ticker} must be finite and non-negative, got {w}"
      )));
    }
    if w == 0.0 {
      skipped.push(ticker.to_string());
      continue;
    }

    let price = match latest_prices.get(ticker) {
      Some(&p) if p.is_finite() && p > 0.0 => p,
      Some(&p) => {
        return Err(PortfolioError::InvalidArgument(format!(
          "price for {ticker} must be positive, got {p}"
        )));
      }
      None => {
        return Err(PortfolioError::InvalidArgument(format!(
          "no latest price for {ticker}"
        )));
      }
    };

    targets.push(Target {
      ticker: ticker.to_string(),
      price,
      target: w * budget,
      shares: 0,
    });
  }

  let mut leftover = budget;
  for t in targets.iter_mut() {
    let by_target = (t.target / t.price + PRICE_EPS).floor();
    let by_cash = (leftover / t.price + PRICE_EPS).floor();
    let shares = by_target.min(by_cash).max(0.0);
    t.shares = shares as u64;
    leftover -= shares * t.price;
  }

  let mut queue: BinaryHeap<(OrderedFloat<f64>, Reverse<usize>)> = targets
    .iter()
    .enumerate()
    .map(|(i, t)| (OrderedFloat(t.score()), Reverse(i)))
    .collect();

  while let Some((OrderedFloat(score), Reverse(i))) = queue.pop() {
    let t = &mut targets[i];
    if t.price > leftover + PRICE_EPS {
      continue;
    }

    // Each share lowers the score by 2 p^2; keep buying while still ahead.
    let affordable = ((leftover + PRICE_EPS) / t.price).floor() as u64;
    let lead = match queue.peek() {
      Some((OrderedFloat(next), _)) => {
        ((score - next) / (2.0 * t.price * t.price)).floor().max(1.0) as u64
      }
      None => affordable,
    };
    let batch = lead.min(affordable).max(1);

    t.shares += batch;
    leftover -= batch as f64 * t.price;
    tracing::debug!(ticker = %t.ticker, batch, shares = t.shares, leftover, "bought shares");
    queue.push((OrderedFloat(t.score()), Reverse(i)));
  }

  let invested: f64 = targets.iter().map(Target::value).sum();
  let leftover_cash = (budget - invested).max(0.0);

  tracing::info!(
    budget,
    invested,
    leftover_cash,
    positions = targets.iter().filter(|t| t.shares > 0).count(),
    "discrete allocation complete"
  );

  let mut by_ticker: HashMap<String, u64> = targets
    .into_iter()
    .map(|t| (t.ticker, t.shares))
    .collect();
  let shares = weights
    .iter()
    .map(|(ticker, _)| {
      let s = by_ticker.remove(ticker).unwrap_or(0);
      (ticker.to_string(), s)
    })
    .collect();

  if !skipped.is_empty() {
    tracing::debug!(?skipped, "zero-weight instruments excluded");
  }

  Ok(AllocationPlan {
    shares,
    leftover_cash,
    budget,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use tracing_test::traced_test;

  use super::*;

  fn weights(pairs: &[(&str, f64)]) -> WeightVector {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
  }

  fn prices(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(t, p)| (t.to_string(), *p)).collect()
  }

  fn assert_budget_identity(plan: &AllocationPlan, px: &HashMap<String, f64>) {
    assert!(plan.leftover_cash >= 0.0);
    assert_relative_eq!(
      plan.invested(px) + plan.leftover_cash,
      plan.budget,
      epsilon = 1e-6
    );
  }

  #[test]
  fn exact_targets_need_no_greedy_rounds() {
    let w = weights(&[("A", 0.5), ("B", 0.3), ("C", 0.2)]);
    let px = prices(&[("A", 100.0), ("B", 50.0), ("C", 20.0)]);

    let plan = allocate(&w, &px, 1000.0).unwrap();

    assert_eq!(plan.shares_of("A"), 5);
    assert_eq!(plan.shares_of("B"), 6);
    assert_eq!(plan.shares_of("C"), 10);
    assert_relative_eq!(plan.leftover_cash, 0.0, epsilon = 1e-9);
  }

  #[test]
  fn greedy_spends_leftover_on_most_underfilled() {
    // Floors: A 3 (300 of 333.3), B 3 (300 of 333.3), C 11 (330 of 333.3).
    // 70 left: one more A (score 2*33.3*100 - 100^2 < 0) loses to C.
    let w = weights(&[("A", 1.0 / 3.0), ("B", 1.0 / 3.0), ("C", 1.0 / 3.0)]);
    let px = prices(&[("A", 100.0), ("B", 100.0), ("C", 30.0)]);

    let plan = allocate(&w, &px, 1000.0).unwrap();

    assert_budget_identity(&plan, &px);
    let min_price = 30.0;
    assert!(plan.leftover_cash < min_price);
    assert_eq!(plan.shares_of("A"), 3);
    assert_eq!(plan.shares_of("B"), 3);
    assert_eq!(plan.shares_of("C"), 13);
    assert_relative_eq!(plan.leftover_cash, 10.0, epsilon = 1e-9);
  }

  #[test]
  fn leftover_is_below_every_weighted_price() {
    let w = weights(&[("A", 0.37), ("B", 0.21), ("C", 0.29), ("D", 0.13)]);
    let px = prices(&[("A", 187.3), ("B", 412.9), ("C", 63.25), ("D", 29.8)]);

    let plan = allocate(&w, &px, 20_000.0).unwrap();

    assert_budget_identity(&plan, &px);
    for (t, _) in w.iter() {
      assert!(plan.leftover_cash < px[t]);
    }
  }

  #[test]
  fn zero_budget_gives_empty_plan() {
    let w = weights(&[("A", 0.6), ("B", 0.4)]);
    let px = prices(&[("A", 10.0), ("B", 20.0)]);

    let plan = allocate(&w, &px, 0.0).unwrap();

    assert!(plan.shares.iter().all(|(_, s)| *s == 0));
    assert_eq!(plan.leftover_cash, 0.0);
  }

  #[test]
  fn budget_below_cheapest_price_keeps_all_cash() {
    let w = weights(&[("A", 0.6), ("B", 0.4)]);
    let px = prices(&[("A", 300.0), ("B", 200.0)]);

    let plan = allocate(&w, &px, 150.0).unwrap();

    assert!(plan.shares.iter().all(|(_, s)| *s == 0));
    assert_eq!(plan.leftover_cash, 150.0);
  }

  #[test]
  fn single_instrument_buys_floor_of_budget() {
    let w = weights(&[("ONLY", 1.0)]);
    let px = prices(&[("ONLY", 37.0)]);

    let plan = allocate(&w, &px, 1000.0).unwrap();

    assert_eq!(plan.shares_of("ONLY"), 27);
    assert_relative_eq!(plan.leftover_cash, 1000.0 - 27.0 * 37.0, epsilon = 1e-9);
  }

  #[test]
  fn zero_weight_instruments_are_never_bought() {
    let w = weights(&[("A", 1.0), ("B", 0.0)]);
    // B has no price at all: zero weights must not need one.
    let px = prices(&[("A", 7.0)]);

    let plan = allocate(&w, &px, 100.0).unwrap();

    assert_eq!(plan.shares_of("B"), 0);
    assert_eq!(plan.shares.len(), 2);
  }

  #[test]
  fn invalid_inputs_are_rejected() {
    let px = prices(&[("A", 10.0)]);
    let w = weights(&[("A", 1.0)]);

    assert!(allocate(&w, &px, -1.0).is_err());
    assert!(allocate(&w, &px, f64::NAN).is_err());
    assert!(allocate(&weights(&[("A", -0.1)]), &px, 100.0).is_err());
    assert!(allocate(&weights(&[("Z", 1.0)]), &px, 100.0).is_err());
    assert!(allocate(&w, &prices(&[("A", 0.0)]), 100.0).is_err());
  }

  #[test]
  fn duplicate_tickers_are_rejected() {
    let w = weights(&[("A", 0.5), ("A", 0.5)]);
    let px = prices(&[("A", 10.0)]);

    assert_eq!(
      allocate(&w, &px, 100.0),
      Err(PortfolioError::DuplicateTicker("A".to_string()))
    );
  }

  #[test]
  fn lone_small_weight_spends_budget_in_one_step() {
    let w = weights(&[("A", 0.01)]);
    let px = prices(&[("A", 1.0)]);

    let plan = allocate(&w, &px, 1e9).unwrap();

    assert_budget_identity(&plan, &px);
    assert_eq!(plan.shares_of("A"), 1_000_000_000);
    assert!(plan.leftover_cash < 1.0);
  }

  #[test]
  fn surplus_is_shared_between_underweight_instruments() {
    let w = weights(&[("A", 0.2), ("B", 0.2)]);
    let px = prices(&[("A", 10.0), ("B", 10.0)]);

    let plan = allocate(&w, &px, 10_000.0).unwrap();

    assert_budget_identity(&plan, &px);
    assert_eq!(plan.shares_of("A") + plan.shares_of("B"), 1000);
    assert!(plan.shares_of("A").abs_diff(plan.shares_of("B")) <= 1);
  }

  #[test]
  #[traced_test]
  fn completion_is_logged() {
    let w = weights(&[("A", 1.0)]);
    let px = prices(&[("A", 10.0)]);

    allocate(&w, &px, 95.0).unwrap();

    assert!(logs_contain("discrete allocation complete"));
  }
}
