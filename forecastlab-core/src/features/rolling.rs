//! Trailing-window statistics over NaN-padded vectors.
//!
//! Output has the same length as the input. A position whose window is
//! incomplete, or contains a NaN, is NaN. Every window is summed directly
//! (no running sum) so results are bit-identical regardless of history length.

/// Rolling mean over the trailing `window` values ending at each index.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "rolling window must be >= 1");
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    for i in (window - 1)..n {
        let slice = &values[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = slice.iter().sum::<f64>() / window as f64;
    }

    result
}

/// Rolling sample standard deviation (n - 1 denominator).
///
/// A window of one value has no sample deviation and yields NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "rolling window must be >= 1");
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window < 2 {
        return result;
    }

    for i in (window - 1)..n {
        let slice = &values[(i + 1 - window)..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
        result[i] = (ss / (window - 1) as f64).sqrt();
    }

    result
}

/// Delay a series by `periods`: `out[i] = values[i - periods]`, NaN-padded at the front.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    for i in periods..n {
        result[i] = values[i - periods];
    }
    result
}

/// Element-wise `a - b` (NaN propagates).
pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}
