//! Differencing and its inverse for the integrated part of the model.

/// Apply first differences `d` times. Output length is `len - d` (or 0).
pub fn difference(values: &[f64], d: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..d {
        if current.len() < 2 {
            return Vec::new();
        }
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

/// Last value of each differencing level 0..d, i.e. the anchors needed to
/// undo `d` differences after the end of `values`.
pub fn integration_anchors(values: &[f64], d: usize) -> Vec<f64> {
    let mut anchors = Vec::with_capacity(d);
    let mut current = values.to_vec();
    for _ in 0..d {
        match current.last() {
            Some(&last) => anchors.push(last),
            None => break,
        }
        current = difference(&current, 1);
    }
    anchors
}

/// Turn forecasts of the `d`-times differenced series back into levels.
///
/// `anchors[k]` is the last observed value of the `k`-times differenced
/// series (see [`integration_anchors`]).
pub fn integrate(forecasts: &[f64], anchors: &[f64]) -> Vec<f64> {
    let mut current = forecasts.to_vec();
    for &anchor in anchors.iter().rev() {
        let mut level = anchor;
        for v in current.iter_mut() {
            level += *v;
            *v = level;
        }
    }
    current
}
