//! Feature importance — absolute correlation of each column with the target.

use serde::{Deserialize, Serialize};

use super::{FeatureColumn, FeatureTable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub column: FeatureColumn,
    /// |Pearson correlation| with `log_close`. NaN for a constant column.
    pub abs_correlation: f64,
}

/// Rank every non-target column by |corr(column, log_close)|, descending.
///
/// Columns with undefined correlation sort last.
pub fn feature_importance(table: &FeatureTable) -> Vec<FeatureImportance> {
    let target = table.log_closes();

    let mut ranked: Vec<FeatureImportance> = FeatureColumn::all()
        .into_iter()
        .filter(|c| *c != FeatureColumn::LogClose)
        .filter_map(|column| {
            let values = table.column(column)?;
            Some(FeatureImportance {
                column,
                abs_correlation: pearson(&values, &target).abs(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| match (a.abs_correlation.is_nan(), b.abs_correlation.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.abs_correlation.total_cmp(&a.abs_correlation),
    });
    ranked
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    sxy / (sxx.sqrt() * syy.sqrt())
}
