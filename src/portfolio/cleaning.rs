//! # Weight Cleaning
//!
//! $$
//! \tilde w_i = \operatorname{round}_d(w_i)\ \text{ if } |w_i|\ge c,\qquad
//! \Big|\sum_i \tilde w_i - \sum_i w_i\Big| \le \sum_{|w_i|<c}|w_i| + n\cdot\tfrac12 10^{-d}
//! $$
//!
//! Reporting precision for optimizer output. The residual from dropped and
//! rounded entries is left as drift; nothing is redistributed.

use crate::error::PortfolioError;
use crate::error::Result;
use super::types::WeightVector;

/// Default cutoff below which a weight is dropped.
pub const DEFAULT_CUTOFF: f64 = 1e-4;

/// Default number of decimals kept.
pub const DEFAULT_ROUNDING: u32 = 5;

/// Drop negligible weights and round the rest to `rounding` decimals.
///
/// Entries that round to zero are dropped as well. `rounding = None` keeps
/// full precision.
pub fn clean_weights(
  weights: &WeightVector,
  cutoff: f64,
  rounding: Option<u32>,
) -> Result<WeightVector> {
  if !(cutoff.is_finite() && cutoff > 0.0) {
    return Err(PortfolioError::InvalidArgument(format!(
      "cutoff must be positive, got {cutoff}"
    )));
  }
  if rounding == Some(0) {
    return Err(PortfolioError::InvalidArgument(
      "rounding must keep at least one decimal".to_string(),
    ));
  }

  let scale = rounding.map(|d| 10f64.powi(d as i32));
  let cleaned: WeightVector = weights
    .iter()
    .filter(|(_, w)| w.abs() >= cutoff)
    .map(|(t, w)| {
      let w = match scale {
        Some(s) => (w * s).round() / s,
        None => w,
      };
      (t.to_string(), w)
    })
    .filter(|(_, w)| *w != 0.0)
    .collect();

  tracing::debug!(
    kept = cleaned.len(),
    dropped = weights.len() - cleaned.len(),
    drift = cleaned.sum() - weights.sum(),
    "cleaned weights"
  );

  Ok(cleaned)
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;

  fn weights(pairs: &[(&str, f64)]) -> WeightVector {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
  }

  #[test]
  fn drops_small_weights_and_rounds_the_rest() {
    let raw = weights(&[
      ("AAA", 0.412_345_678),
      ("BBB", 0.000_05),
      ("CCC", 0.587_604_322),
    ]);

    let cleaned = clean_weights(&raw, 1e-4, Some(4)).unwrap();

    assert_eq!(cleaned.len(), 2);
    assert_eq!(cleaned.get("AAA"), Some(0.4123));
    assert_eq!(cleaned.get("BBB"), None);
    assert_eq!(cleaned.get("CCC"), Some(0.5876));
  }

  #[test]
  fn drift_stays_within_documented_bound() {
    let raw = weights(&[
      ("A", 0.199_996),
      ("B", 0.000_08),
      ("C", 0.300_004_4),
      ("D", 0.249_997_3),
      ("E", 0.249_922_3),
    ]);
    let rounding = 5;

    let cleaned = clean_weights(&raw, 1e-4, Some(rounding)).unwrap();

    let dropped = 0.000_08;
    let bound = dropped + raw.len() as f64 * 0.5 * 10f64.powi(-(rounding as i32));
    assert!((cleaned.sum() - raw.sum()).abs() <= bound + 1e-15);
  }

  #[test]
  fn entries_rounding_to_zero_are_dropped() {
    let raw = weights(&[("A", 0.999_8), ("B", 0.000_2)]);
    let cleaned = clean_weights(&raw, 1e-4, Some(3)).unwrap();

    assert_eq!(cleaned.len(), 1);
    assert_relative_eq!(cleaned.get("A").unwrap(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn cleaning_is_deterministic_and_keeps_order() {
    let raw = weights(&[("Z", 0.3), ("A", 0.7)]);
    let a = clean_weights(&raw, DEFAULT_CUTOFF, Some(DEFAULT_ROUNDING)).unwrap();
    let b = clean_weights(&raw, DEFAULT_CUTOFF, Some(DEFAULT_ROUNDING)).unwrap();

    assert_eq!(a, b);
    let order: Vec<&str> = a.iter().map(|(t, _)| t).collect();
    assert_eq!(order, vec!["Z", "A"]);
  }

  #[test]
  fn no_rounding_keeps_full_precision() {
    let raw = weights(&[("A", 0.123_456_789), ("B", 0.876_543_211)]);
    let cleaned = clean_weights(&raw, 1e-4, None).unwrap();
    assert_eq!(cleaned, raw);
  }

  #[test]
  fn invalid_tolerances_are_rejected() {
    let raw = weights(&[("A", 1.0)]);
    assert!(matches!(
      clean_weights(&raw, 0.0, Some(4)),
      Err(PortfolioError::InvalidArgument(_))
    ));
    assert!(matches!(
      clean_weights(&raw, 1e-4, Some(0)),
      Err(PortfolioError::InvalidArgument(_))
    ));
  }
}
