//! Prediction metrics — pure functions over actual/predicted pairs.
//!
//! Rows whose prediction is invalid (outside the walk-forward window or a
//! failed fit) are ignored, never counted as zero error.

use serde::{Deserialize, Serialize};

use forecastlab_core::domain::{ForecastRow, PredictionColumn};

/// Error summary for one prediction column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    pub column: PredictionColumn,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    /// Mean absolute percentage error, in percent.
    pub mape: Option<f64>,
    /// Rows with a valid prediction and actual.
    pub count: usize,
}

impl PredictionMetrics {
    /// Compute every metric for `column` over `rows`.
    pub fn compute(rows: &[ForecastRow], column: PredictionColumn) -> Self {
        let pairs = valid_pairs(rows, column);
        Self {
            column,
            rmse: rmse(&pairs),
            mae: mae(&pairs),
            mape: mape(&pairs),
            count: pairs.len(),
        }
    }
}

/// Metrics for all three prediction columns.
pub fn prediction_metrics(rows: &[ForecastRow]) -> Vec<PredictionMetrics> {
    PredictionColumn::ALL
        .into_iter()
        .map(|c| PredictionMetrics::compute(rows, c))
        .collect()
}

/// `(actual, predicted)` for rows where both are finite.
pub fn valid_pairs(rows: &[ForecastRow], column: PredictionColumn) -> Vec<(f64, f64)> {
    rows.iter()
        .filter_map(|r| r.prediction(column).map(|p| (r.close, p)))
        .filter(|(a, p)| a.is_finite() && p.is_finite())
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Root mean squared error. `None` for no pairs.
pub fn rmse(pairs: &[(f64, f64)]) -> Option<f64> {
    mean(pairs.iter().map(|(a, p)| (p - a).powi(2))).map(f64::sqrt)
}

/// Mean absolute error. `None` for no pairs.
pub fn mae(pairs: &[(f64, f64)]) -> Option<f64> {
    mean(pairs.iter().map(|(a, p)| (p - a).abs()))
}

/// Mean absolute percentage error. Pairs with a zero actual are skipped.
pub fn mape(pairs: &[(f64, f64)]) -> Option<f64> {
    mean(
        pairs
            .iter()
            .filter(|(a, _)| *a != 0.0)
            .map(|(a, p)| ((p - a) / a).abs() * 100.0),
    )
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
