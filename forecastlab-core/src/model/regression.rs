//! Least squares for the trend / exogenous part of the model.
//!
//! Solved by SVD so rank-deficient designs (collinear regressors) still get a
//! minimum-norm solution instead of a singular-matrix failure.

use nalgebra::{DMatrix, DVector};

/// Singular values below `SVD_EPS * largest` are treated as zero.
const SVD_EPS: f64 = 1e-10;

/// Solve `min ||y - X b||` for column-major `columns`. `None` if the solve
/// fails or produces non-finite coefficients.
pub fn least_squares(columns: &[Vec<f64>], y: &[f64]) -> Option<Vec<f64>> {
    let n = y.len();
    let k = columns.len();
    if k == 0 {
        return Some(Vec::new());
    }
    if n == 0 || columns.iter().any(|c| c.len() != n) {
        return None;
    }

    let x = DMatrix::from_fn(n, k, |i, j| columns[j][i]);
    let b = DVector::from_column_slice(y);
    let svd = x.svd(true, true);
    let max_sv = svd.singular_values.max();
    let beta = svd.solve(&b, SVD_EPS * max_sv.max(1.0)).ok()?;

    let coefficients: Vec<f64> = beta.iter().copied().collect();
    coefficients.iter().all(|c| c.is_finite()).then_some(coefficients)
}

/// A fitted linear regression in the caller's original units.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearFit {
    /// Constant term, when requested.
    pub intercept: Option<f64>,
    /// One slope per input column; 0 for columns dropped as constant.
    pub slopes: Vec<f64>,
    pub residuals: Vec<f64>,
}

impl LinearFit {
    /// Count of estimated coefficients (constant plus non-dropped slopes).
    pub fn n_params(&self) -> usize {
        usize::from(self.intercept.is_some()) + self.slopes.iter().filter(|b| **b != 0.0).count()
    }
}

/// Regress `y` on an optional constant and `columns`.
///
/// Non-constant columns are standardized before solving (centered as well
/// when a constant is present) and coefficients are mapped back afterwards.
/// Constant columns are dropped: with an intercept they are collinear with
/// it, without one they carry no variation the residuals could lose.
pub fn fit_linear(y: &[f64], columns: &[Vec<f64>], constant: bool) -> Option<LinearFit> {
    let n = y.len();
    if n == 0 {
        return None;
    }

    let mut design: Vec<Vec<f64>> = Vec::with_capacity(columns.len() + 1);
    if constant {
        design.push(vec![1.0; n]);
    }

    // (input index, centre, scale) for each kept column.
    let mut kept: Vec<(usize, f64, f64)> = Vec::new();
    for (j, col) in columns.iter().enumerate() {
        if col.len() != n {
            return None;
        }
        let mean = col.iter().sum::<f64>() / n as f64;
        let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let sd = var.sqrt();
        if !sd.is_finite() || sd <= f64::EPSILON * mean.abs().max(1.0) {
            continue;
        }
        let centre = if constant { mean } else { 0.0 };
        design.push(col.iter().map(|v| (v - centre) / sd).collect());
        kept.push((j, centre, sd));
    }

    let beta = least_squares(&design, y)?;

    let offset = usize::from(constant);
    let mut slopes = vec![0.0; columns.len()];
    let mut intercept = if constant { Some(beta[0]) } else { None };
    for (idx, &(j, centre, sd)) in kept.iter().enumerate() {
        let slope = beta[offset + idx] / sd;
        slopes[j] = slope;
        if let Some(c) = intercept.as_mut() {
            *c -= slope * centre;
        }
    }

    let residuals = (0..n)
        .map(|t| {
            let fitted = intercept.unwrap_or(0.0)
                + columns
                    .iter()
                    .zip(&slopes)
                    .map(|(col, b)| b * col[t])
                    .sum::<f64>();
            y[t] - fitted
        })
        .collect();

    Some(LinearFit {
        intercept,
        slopes,
        residuals,
    })
}
