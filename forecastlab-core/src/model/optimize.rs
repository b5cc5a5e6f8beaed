//! Nelder–Mead downhill simplex minimizer.
//!
//! Derivative-free, which suits the conditional-sum-of-squares objective: it
//! is cheap to evaluate but has no closed-form gradient once the parameters
//! pass through the stationarity transform.

use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("deadline exceeded after {iterations} iterations")]
    TimedOut { iterations: usize },

    #[error("objective is not finite at the starting point")]
    NonFiniteStart,
}

#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    pub max_iter: usize,
    /// Simplex diameter tolerance (max |x_i - x_best|).
    pub xtol: f64,
    /// Objective spread tolerance (max |f_i - f_best|).
    pub ftol: f64,
    pub deadline: Option<Instant>,
}

impl NelderMeadOptions {
    /// Defaults scaled to the problem dimension.
    pub fn for_dim(dim: usize) -> Self {
        Self {
            max_iter: 500 * dim.max(1),
            xtol: 1e-4,
            ftol: 1e-8,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const ALPHA: f64 = 1.0; // reflection
const GAMMA: f64 = 2.0; // expansion
const RHO: f64 = 0.5; // contraction
const SIGMA: f64 = 0.5; // shrink

/// Minimize `f` from `x0`. Non-finite objective values are treated as +inf,
/// so the simplex backs away from infeasible regions.
pub fn nelder_mead<F>(
    mut f: F,
    x0: &[f64],
    opts: &NelderMeadOptions,
) -> Result<Minimum, OptimizeError>
where
    F: FnMut(&[f64]) -> f64,
{
    let mut eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let dim = x0.len();
    let f0 = eval(x0);
    if !f0.is_finite() {
        return Err(OptimizeError::NonFiniteStart);
    }
    if dim == 0 {
        return Ok(Minimum {
            x: Vec::new(),
            value: f0,
            iterations: 0,
            converged: true,
        });
    }

    // Initial simplex: x0 plus one perturbed vertex per coordinate.
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((x0.to_vec(), f0));
    for i in 0..dim {
        let mut v = x0.to_vec();
        v[i] = if v[i].abs() > 1e-8 { v[i] * 1.05 } else { 0.1 };
        let fv = eval(&v);
        simplex.push((v, fv));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < opts.max_iter {
        if let Some(deadline) = opts.deadline {
            if Instant::now() >= deadline {
                return Err(OptimizeError::TimedOut { iterations });
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = &simplex[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|(v, _)| v.iter().zip(&best.0).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let f_spread = simplex[1..]
            .iter()
            .map(|(_, fv)| (fv - best.1).abs())
            .fold(0.0_f64, f64::max);
        if x_spread <= opts.xtol && f_spread <= opts.ftol {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; dim];
        for (v, _) in &simplex[..dim] {
            for (c, x) in centroid.iter_mut().zip(v) {
                *c += x / dim as f64;
            }
        }
        let worst_f = simplex[dim].1;
        let second_worst_f = simplex[dim - 1].1;
        let toward = |coef: f64, worst: &[f64]| -> Vec<f64> {
            centroid
                .iter()
                .zip(worst)
                .map(|(c, w)| c + coef * (c - w))
                .collect()
        };

        let reflected = toward(ALPHA, &simplex[dim].0);
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = toward(GAMMA, &simplex[dim].0);
            let f_expanded = eval(&expanded);
            simplex[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < second_worst_f {
            simplex[dim] = (reflected, f_reflected);
            continue;
        }

        // Contraction: outside if the reflection improved on the worst, inside otherwise.
        let (contracted, f_contracted) = if f_reflected < worst_f {
            let c = toward(RHO, &simplex[dim].0);
            let fc = eval(&c);
            (c, fc)
        } else {
            let c = toward(-RHO, &simplex[dim].0);
            let fc = eval(&c);
            (c, fc)
        };
        if f_contracted < worst_f.min(f_reflected) {
            simplex[dim] = (contracted, f_contracted);
            continue;
        }

        // Shrink toward the best vertex.
        let best_x = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = best_x
                .iter()
                .zip(&vertex.0)
                .map(|(b, x)| b + SIGMA * (x - b))
                .collect();
            let fs = eval(&shrunk);
            *vertex = (shrunk, fs);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Ok(Minimum {
        x,
        value,
        iterations,
        converged,
    })
}
