//! ARMA building blocks: parameter transforms, conditional residuals,
//! Hannan–Rissanen starting values and the recursive point forecast.
//!
//! Convention: `u[t] = Σ phi[i]·u[t-1-i] + e[t] + Σ theta[j]·e[t-1-j]`.

use super::regression::least_squares;

/// Map unconstrained reals to the coefficients of a stationary AR
/// polynomial (Monahan 1984): each value becomes a partial autocorrelation
/// in (-1, 1), then Durbin–Levinson builds the coefficients.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let mut coeffs: Vec<f64> = Vec::with_capacity(unconstrained.len());
    for (k, &x) in unconstrained.iter().enumerate() {
        let r = x / (1.0 + x * x).sqrt();
        let mut next = vec![0.0; k + 1];
        for j in 0..k {
            next[j] = coeffs[j] - r * coeffs[k - 1 - j];
        }
        next[k] = r;
        coeffs = next;
    }
    coeffs
}

/// Inverse of [`constrain_stationary`]. `None` if `coeffs` is not stationary.
pub fn unconstrain_stationary(coeffs: &[f64]) -> Option<Vec<f64>> {
    let m = coeffs.len();
    let mut out = vec![0.0; m];
    let mut current = coeffs.to_vec();
    for k in (0..m).rev() {
        let r = current[k];
        if !r.is_finite() || r.abs() >= 1.0 {
            return None;
        }
        out[k] = r / (1.0 - r * r).sqrt();
        let denom = 1.0 - r * r;
        current = (0..k)
            .map(|j| (current[j] + r * current[k - 1 - j]) / denom)
            .collect();
    }
    Some(out)
}

/// MA coefficients whose polynomial `1 + Σ theta z^j` is invertible.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
    constrain_stationary(unconstrained).into_iter().map(|c| -c).collect()
}

pub fn unconstrain_invertible(theta: &[f64]) -> Option<Vec<f64>> {
    let negated: Vec<f64> = theta.iter().map(|c| -c).collect();
    unconstrain_stationary(&negated)
}

/// Conditional one-step residuals for `t >= p`, with pre-sample errors at zero.
/// Output length is `u.len() - p`.
pub fn css_residuals(u: &[f64], phi: &[f64], theta: &[f64]) -> Vec<f64> {
    let p = phi.len();
    let n = u.len();
    if n <= p {
        return Vec::new();
    }
    let mut e = vec![0.0; n];
    for t in p..n {
        let mut value = u[t];
        for (i, a) in phi.iter().enumerate() {
            value -= a * u[t - 1 - i];
        }
        for (j, b) in theta.iter().enumerate() {
            if t > j {
                value -= b * e[t - 1 - j];
            }
        }
        e[t] = value;
    }
    e.split_off(p)
}

/// Lagged-column design: `columns[i][r] = series[start + r - 1 - i]`.
fn lag_columns(series: &[f64], lags: usize, start: usize, end: usize) -> Vec<Vec<f64>> {
    (0..lags)
        .map(|i| (start..end).map(|t| series[t - 1 - i]).collect())
        .collect()
}

/// Hannan–Rissanen starting values `(phi, theta)`.
///
/// A long autoregression supplies residual estimates, then one least-squares
/// pass on lagged values and lagged residuals gives the ARMA coefficients.
/// Components outside the stationary / invertible region are reset to zero.
pub fn hannan_rissanen(u: &[f64], p: usize, q: usize) -> (Vec<f64>, Vec<f64>) {
    let n = u.len();
    let zeros = (vec![0.0; p], vec![0.0; q]);
    if p + q == 0 {
        return zeros;
    }

    // Long-autoregression residuals and the order they start after.
    let (residuals, long_order) = if q == 0 {
        (Vec::new(), 0)
    } else {
        let ln_n = (n.max(2) as f64).ln();
        let m = ((ln_n * ln_n).ceil() as usize).max(p.max(q) + 1).min(n / 3);
        if m == 0 || n <= 2 * m + q + p {
            return zeros;
        }
        let design = lag_columns(u, m, m, n);
        let Some(ar) = least_squares(&design, &u[m..]) else {
            return zeros;
        };
        let mut e = vec![0.0; n];
        for t in m..n {
            e[t] = u[t] - (0..m).map(|i| ar[i] * u[t - 1 - i]).sum::<f64>();
        }
        (e, m)
    };

    // Second stage starts once both lagged values and lagged residuals exist.
    let start = p.max(long_order + q);
    if n <= start + p + q {
        return zeros;
    }
    let mut design = lag_columns(u, p, start, n);
    if q > 0 {
        design.extend(lag_columns(&residuals, q, start, n));
    }
    let Some(beta) = least_squares(&design, &u[start..]) else {
        return zeros;
    };

    let mut phi = beta[..p].to_vec();
    let mut theta = beta[p..].to_vec();
    if unconstrain_stationary(&phi).is_none() {
        phi = vec![0.0; p];
    }
    if unconstrain_invertible(&theta).is_none() {
        theta = vec![0.0; q];
    }
    (phi, theta)
}

/// Recursive h-step point forecast. Future innovations are zero.
///
/// `history` must hold at least `phi.len()` trailing values and
/// `residuals` at least `theta.len()` trailing residuals.
pub fn forecast(
    history: &[f64],
    residuals: &[f64],
    phi: &[f64],
    theta: &[f64],
    steps: usize,
) -> Vec<f64> {
    let mut u: Vec<f64> = history.to_vec();
    let mut e: Vec<f64> = residuals.to_vec();
    let mut out = Vec::with_capacity(steps);
    for _ in 0..steps {
        let mut value = 0.0;
        for (i, a) in phi.iter().enumerate() {
            if let Some(v) = u.len().checked_sub(1 + i).map(|idx| u[idx]) {
                value += a * v;
            }
        }
        for (j, b) in theta.iter().enumerate() {
            if let Some(v) = e.len().checked_sub(1 + j).map(|idx| e[idx]) {
                value += b * v;
            }
        }
        u.push(value);
        e.push(0.0);
        out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!((actual - expected).abs() < tol, "actual={actual}, expected={expected}");
    }

    /// AR(p) polynomial roots lie outside the unit circle iff the
    /// Schur–Cohn / step-down recursion keeps every |r_k| < 1.
    fn is_stationary(coeffs: &[f64]) -> bool {
        unconstrain_stationary(coeffs).is_some()
    }

    #[test]
    fn constrain_is_stationary() {
        for x in [[-5.0, 3.0, 0.2], [10.0, -10.0, 10.0], [0.0, 0.0, 0.0]] {
            assert!(is_stationary(&constrain_stationary(&x)));
        }
    }

    #[test]
    fn ar1_transform() {
        let c = constrain_stationary(&[1.0]);
        assert_approx(c[0], 1.0 / 2.0_f64.sqrt(), 1e-12);
    }

    #[test]
    fn transforms_are_inverse() {
        let x = [0.4, -1.3, 2.1];
        let back = unconstrain_stationary(&constrain_stationary(&x)).unwrap();
        for (a, b) in x.iter().zip(&back) {
            assert_approx(*a, *b, 1e-9);
        }
        let theta = constrain_invertible(&x);
        let back = unconstrain_invertible(&theta).unwrap();
        for (a, b) in x.iter().zip(&back) {
            assert_approx(*a, *b, 1e-9);
        }
    }

    #[test]
    fn explosive_ar_is_rejected() {
        assert!(unconstrain_stationary(&[1.2]).is_none());
        assert!(unconstrain_stationary(&[0.5, 0.6]).is_none());
        assert!(unconstrain_stationary(&[0.5, 0.3]).is_some());
    }

    #[test]
    fn residuals_of_pure_ar() {
        let u = [1.0, 2.0, 3.0, 4.0];
        let e = css_residuals(&u, &[0.5], &[]);
        assert_eq!(e, vec![1.5, 2.0, 2.5]);
    }

    #[test]
    fn residuals_of_pure_ma() {
        let u = [1.0, 1.0, 1.0];
        // e0 = 1, e1 = 1 - 0.5, e2 = 1 - 0.5*0.5
        let e = css_residuals(&u, &[], &[0.5]);
        assert_eq!(e, vec![1.0, 0.5, 0.75]);
    }

    #[test]
    fn hannan_rissanen_recovers_ar1() {
        // Deterministic pseudo-noise driving an AR(1) with phi = 0.6.
        let mut u = vec![0.0; 600];
        let mut state: u64 = 42;
        for t in 1..u.len() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            u[t] = 0.6 * u[t - 1] + noise;
        }
        let (phi, theta) = hannan_rissanen(&u, 1, 0);
        assert!(theta.is_empty());
        assert_approx(phi[0], 0.6, 0.1);
    }

    #[test]
    fn hannan_rissanen_short_series_falls_back_to_zero() {
        let (phi, theta) = hannan_rissanen(&[0.1, -0.2, 0.3], 2, 2);
        assert_eq!(phi, vec![0.0, 0.0]);
        assert_eq!(theta, vec![0.0, 0.0]);
    }

    #[test]
    fn forecast_ar1_decays() {
        let f = forecast(&[2.0], &[0.0], &[0.5], &[], 3);
        assert_eq!(f, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn forecast_ma1_uses_last_residual_once() {
        let f = forecast(&[0.0], &[2.0], &[], &[0.5], 3);
        assert_eq!(f, vec![1.0, 0.0, 0.0]);
    }
}
