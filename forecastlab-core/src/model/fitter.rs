//! Model Fitter — one (p, d, q) configuration on one training window.
//!
//! Estimation is conditional sum of squares:
//! 1. Difference the target `d` times (and the regressors with it).
//! 2. Remove the constant / exogenous part by least squares.
//! 3. Fit the ARMA(p, q) part of the regression residuals by Nelder–Mead
//!    over stationarity / invertibility constrained parameters.
//!
//! Every failure is a [`FitFailure`] value. Nothing in here panics on bad
//! data, so grid and walk-forward loops can skip a failed unit and continue.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::arma;
use super::config::{ConfigError, ModelConfig};
use super::diff::{difference, integrate, integration_anchors};
use super::exog::ExogenousMatrix;
use super::optimize::{nelder_mead, NelderMeadOptions, OptimizeError};
use super::regression::fit_linear;

// ─── Results and failures ───────────────────────────────────────────

/// Published diagnostics of a successful fit. Coefficients stay internal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub config: ModelConfig,
    pub aic: f64,
    /// sqrt(mean squared one-step residual), in the target's units.
    pub rmse: f64,
    /// Observations in the training window (before differencing).
    pub train_size: usize,
}

/// Why a configuration could not be fitted on a window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("insufficient observations: need {required}, have {available}")]
    InsufficientObservations { required: usize, available: usize },

    #[error("{family} requires exogenous regressors")]
    MissingExogenous { family: String },

    #[error("exogenous rows ({actual}) do not match samples ({expected})")]
    ExogenousMismatch { expected: usize, actual: usize },

    #[error("non-finite value in {0}")]
    NonFiniteInput(&'static str),

    #[error("optimizer did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("numerically singular fit: {0}")]
    Singular(String),

    #[error("fit exceeded its {budget_ms} ms budget")]
    TimedOut { budget_ms: u64 },
}

/// Coarse failure category, used for aggregate counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    InsufficientData,
    InvalidInput,
    NonConvergence,
    Singular,
    TimedOut,
}

impl FailureKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::InsufficientData => "insufficient_data",
            Self::InvalidInput => "invalid_input",
            Self::NonConvergence => "non_convergence",
            Self::Singular => "singular",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FitFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Config,
            Self::InsufficientObservations { .. } => FailureKind::InsufficientData,
            Self::MissingExogenous { .. }
            | Self::ExogenousMismatch { .. }
            | Self::NonFiniteInput(_) => FailureKind::InvalidInput,
            Self::NonConvergence { .. } => FailureKind::NonConvergence,
            Self::Singular(_) => FailureKind::Singular,
            Self::TimedOut { .. } => FailureKind::TimedOut,
        }
    }
}

// ─── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FitOptions {
    /// Wall-clock budget for the whole fit. `None` = unbounded.
    pub timeout: Option<Duration>,
    /// Override of the optimizer iteration cap (default 500 per parameter).
    pub max_iter: Option<usize>,
}

impl FitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            max_iter: None,
        }
    }
}

/// Smallest training window accepted for a configuration: every estimated
/// parameter plus the differencing loss plus two residual degrees of freedom.
pub fn min_observations(config: &ModelConfig, n_exog: usize) -> usize {
    let o = config.order;
    o.p + o.d + o.q + regression_terms(config, n_exog) + 2
}

fn regression_terms(config: &ModelConfig, n_exog: usize) -> usize {
    let exog = if config.family.uses_exogenous() { n_exog } else { 0 };
    usize::from(config.trend) + exog
}

// ─── Fitted model ───────────────────────────────────────────────────

/// A fitted model: diagnostics plus the state needed to forecast.
#[derive(Debug, Clone)]
pub struct FittedModel {
    result: FitResult,
    phi: Vec<f64>,
    theta: Vec<f64>,
    /// Constant on the differenced scale (mean for d = 0, drift otherwise).
    constant: f64,
    /// Trailing regression-residual values (ARMA input), at least `p` long.
    arma_tail: Vec<f64>,
    /// Trailing one-step residuals, at least `q` long.
    residual_tail: Vec<f64>,
    /// Last value of each differencing level, see [`integration_anchors`].
    anchors: Vec<f64>,
}

impl FittedModel {
    pub fn result(&self) -> &FitResult {
        &self.result
    }

    /// Point forecasts for the next `steps` observations, in the target's units.
    ///
    /// Exogenous families cannot forecast: future regressor values are unknown.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, FitFailure> {
        self.result.config.validate_for_forecast()?;

        let arma_part = arma::forecast(
            &self.arma_tail,
            &self.residual_tail,
            &self.phi,
            &self.theta,
            steps,
        );
        let differenced: Vec<f64> = arma_part.iter().map(|v| v + self.constant).collect();
        let levels = integrate(&differenced, &self.anchors);

        if levels.iter().any(|v| !v.is_finite()) {
            return Err(FitFailure::Singular("non-finite forecast".into()));
        }
        Ok(levels)
    }
}

// ─── Fitting ────────────────────────────────────────────────────────

/// Fit `config` to `samples` (oldest first), optionally with row-aligned
/// exogenous regressors. The training window is applied here.
pub fn fit(
    samples: &[f64],
    config: &ModelConfig,
    exog: Option<&ExogenousMatrix>,
    options: &FitOptions,
) -> Result<FittedModel, FitFailure> {
    config.validate()?;
    let deadline = options.timeout.map(|t| Instant::now() + t);

    let exog = if config.family.uses_exogenous() {
        let matrix = exog.ok_or_else(|| FitFailure::MissingExogenous {
            family: config.family.to_string(),
        })?;
        if !matrix.is_rectangular() || matrix.n_rows() != samples.len() {
            return Err(FitFailure::ExogenousMismatch {
                expected: samples.len(),
                actual: matrix.n_rows(),
            });
        }
        Some(matrix)
    } else {
        None
    };

    let n_total = samples.len();
    let start = config.window.start_index(n_total);
    let y = &samples[start..];
    let window_exog = exog.map(|m| m.slice_rows(start, n_total));

    if y.iter().any(|v| !v.is_finite()) {
        return Err(FitFailure::NonFiniteInput("samples"));
    }
    if window_exog.as_ref().is_some_and(|m| !m.is_finite()) {
        return Err(FitFailure::NonFiniteInput("exogenous regressors"));
    }

    let n_exog = window_exog.as_ref().map_or(0, ExogenousMatrix::n_cols);
    let required = min_observations(config, n_exog);
    if y.len() < required {
        return Err(FitFailure::InsufficientObservations {
            required,
            available: y.len(),
        });
    }

    let order = config.order;
    let (p, d, q) = (order.p, order.d, order.q);

    // 1. Differencing.
    let y_diff = difference(y, d);
    let signal = y_diff.iter().map(|v| v * v).sum::<f64>() / y_diff.len().max(1) as f64;
    let x_diff: Vec<Vec<f64>> = window_exog
        .as_ref()
        .map(|m| m.columns().iter().map(|c| difference(c, d)).collect())
        .unwrap_or_default();

    // 2. Constant / exogenous regression.
    let (u, constant, k_reg) = if config.trend || !x_diff.is_empty() {
        let lin = fit_linear(&y_diff, &x_diff, config.trend)
            .ok_or_else(|| FitFailure::Singular("regression solve failed".into()))?;
        let k = lin.n_params();
        (lin.residuals, lin.intercept.unwrap_or(0.0), k)
    } else {
        (y_diff, 0.0, 0)
    };

    // 3. ARMA part.
    let (phi, theta) = fit_arma(&u, p, q, deadline, options)?;

    let residuals = arma::css_residuals(&u, &phi, &theta);
    let n_eff = residuals.len();
    if n_eff == 0 {
        return Err(FitFailure::InsufficientObservations {
            required,
            available: y.len(),
        });
    }
    let sse: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma2 = sse / n_eff as f64;
    // A residual variance at rounding level means an exact (degenerate) fit.
    if !sigma2.is_finite() || sigma2 <= f64::EPSILON * signal {
        return Err(FitFailure::Singular(format!("residual variance {sigma2}")));
    }

    let n = n_eff as f64;
    let llf = -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    let k = (p + q + k_reg + 1) as f64;
    let aic = 2.0 * k - 2.0 * llf;
    let rmse = sigma2.sqrt();

    let result = FitResult {
        config: *config,
        aic,
        rmse,
        train_size: y.len(),
    };
    debug!(
        model = %config.label(),
        window = %config.window,
        train_size = y.len(),
        aic,
        rmse,
        "fit ok"
    );

    Ok(FittedModel {
        result,
        arma_tail: tail(&u, p),
        residual_tail: tail(&residuals, q),
        anchors: integration_anchors(y, d),
        phi,
        theta,
        constant,
    })
}

/// Convenience wrapper returning only the published diagnostics.
pub fn fit_result(
    samples: &[f64],
    config: &ModelConfig,
    exog: Option<&ExogenousMatrix>,
    options: &FitOptions,
) -> Result<FitResult, FitFailure> {
    fit(samples, config, exog, options).map(|m| m.result)
}

fn tail(values: &[f64], n: usize) -> Vec<f64> {
    values[values.len().saturating_sub(n)..].to_vec()
}

fn fit_arma(
    u: &[f64],
    p: usize,
    q: usize,
    deadline: Option<Instant>,
    options: &FitOptions,
) -> Result<(Vec<f64>, Vec<f64>), FitFailure> {
    if p + q == 0 {
        return Ok((Vec::new(), Vec::new()));
    }

    let (phi0, theta0) = arma::hannan_rissanen(u, p, q);
    let mut x0 = arma::unconstrain_stationary(&phi0).unwrap_or_else(|| vec![0.0; p]);
    x0.extend(arma::unconstrain_invertible(&theta0).unwrap_or_else(|| vec![0.0; q]));

    // Concentrated objective: half log of the mean squared residual.
    let objective = |x: &[f64]| {
        let phi = arma::constrain_stationary(&x[..p]);
        let theta = arma::constrain_invertible(&x[p..]);
        let e = arma::css_residuals(u, &phi, &theta);
        if e.is_empty() {
            return f64::INFINITY;
        }
        let mse = e.iter().map(|v| v * v).sum::<f64>() / e.len() as f64;
        0.5 * mse.ln()
    };

    let mut nm = NelderMeadOptions::for_dim(p + q);
    if let Some(max_iter) = options.max_iter {
        nm.max_iter = max_iter;
    }
    nm.deadline = deadline;

    let minimum = nelder_mead(objective, &x0, &nm).map_err(|e| match e {
        OptimizeError::TimedOut { .. } => FitFailure::TimedOut {
            budget_ms: options
                .timeout
                .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        },
        OptimizeError::NonFiniteStart => FitFailure::Singular("objective not finite at start".into()),
    })?;
    if !minimum.converged {
        return Err(FitFailure::NonConvergence {
            iterations: minimum.iterations,
        });
    }

    Ok((
        arma::constrain_stationary(&minimum.x[..p]),
        arma::constrain_invertible(&minimum.x[p..]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::{Order, TrainWindow};

    fn noisy_walk(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        let mut level = 4.6;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                level += ((state >> 33) as f64 / (1u64 << 31) as f64 - 0.5) * 0.04;
                level
            })
            .collect()
    }

    #[test]
    fn random_walk_forecast_is_last_value() {
        let y = noisy_walk(200, 7);
        let model = fit(&y, &ModelConfig::random_walk(), None, &FitOptions::default()).unwrap();
        let f = model.forecast(3).unwrap();
        assert!(f.iter().all(|v| *v == y[199]));
    }

    #[test]
    fn random_walk_rmse_is_rms_of_differences() {
        let y = noisy_walk(150, 3);
        let result = fit_result(&y, &ModelConfig::random_walk(), None, &FitOptions::default()).unwrap();
        let diffs = difference(&y, 1);
        let expected = (diffs.iter().map(|v| v * v).sum::<f64>() / diffs.len() as f64).sqrt();
        assert!((result.rmse - expected).abs() < 1e-12);
        assert_eq!(result.train_size, 150);
    }

    #[test]
    fn drift_forecast_extends_linearly() {
        let y = noisy_walk(300, 11);
        let model = fit(&y, &ModelConfig::random_walk_drift(), None, &FitOptions::default()).unwrap();
        let f = model.forecast(2).unwrap();
        let drift = (y[299] - y[0]) / 299.0;
        assert!((f[0] - (y[299] + drift)).abs() < 1e-9);
        assert!((f[1] - (y[299] + 2.0 * drift)).abs() < 1e-9);
    }

    #[test]
    fn white_noise_forecast_is_mean() {
        let y: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { 3.0 }).collect();
        let model = fit(&y, &ModelConfig::white_noise(), None, &FitOptions::default()).unwrap();
        assert!((model.forecast(1).unwrap()[0] - 2.0).abs() < 1e-12);
        assert!((model.result().rmse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn arima_fits_and_forecasts_finite() {
        let y = noisy_walk(400, 5);
        let model = fit(&y, &ModelConfig::arima(1, 1, 1), None, &FitOptions::default()).unwrap();
        let r = model.result();
        assert!(r.aic.is_finite());
        assert!(r.rmse > 0.0);
        let f = model.forecast(3).unwrap();
        assert_eq!(f.len(), 3);
        assert!(f.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn ar1_coefficient_is_recovered() {
        let mut state: u64 = 99;
        let mut u = vec![0.0; 800];
        for t in 1..u.len() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let noise = (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5;
            u[t] = 0.7 * u[t - 1] + noise;
        }
        let model = fit(&u, &ModelConfig::arma(1, 0), None, &FitOptions::default()).unwrap();
        assert!((model.phi[0] - 0.7).abs() < 0.08);
    }

    #[test]
    fn too_few_observations() {
        let y = noisy_walk(6, 1);
        let err = fit(&y, &ModelConfig::arima(2, 1, 2), None, &FitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            FitFailure::InsufficientObservations {
                required: 7,
                available: 6
            }
        );
        assert_eq!(err.kind(), FailureKind::InsufficientData);
    }

    #[test]
    fn min_observations_exceeds_order_sum() {
        for (p, d, q) in [(0, 0, 0), (2, 1, 2), (2, 3, 2)] {
            let cfg = ModelConfig::arima(p, d, q);
            assert!(min_observations(&cfg, 0) > p + d + q);
        }
    }

    #[test]
    fn invalid_order_is_config_failure() {
        let mut cfg = ModelConfig::arima(1, 1, 1);
        cfg.order = Order::new(1, 5, 1);
        let err = fit(&noisy_walk(100, 1), &cfg, None, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Config);
    }

    #[test]
    fn exogenous_length_mismatch() {
        let y = noisy_walk(100, 2);
        let exog = ExogenousMatrix::new(vec!["x".into()], vec![noisy_walk(90, 3)]);
        let err = fit(&y, &ModelConfig::arimax(1, 1, 0), Some(&exog), &FitOptions::default()).unwrap_err();
        assert_eq!(err, FitFailure::ExogenousMismatch { expected: 100, actual: 90 });
    }

    #[test]
    fn exogenous_family_requires_matrix() {
        let err = fit(&noisy_walk(100, 2), &ModelConfig::arimax(1, 1, 0), None, &FitOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
    }

    #[test]
    fn arimax_fits_but_refuses_to_forecast() {
        let y = noisy_walk(200, 8);
        let x = noisy_walk(200, 9);
        let exog = ExogenousMatrix::new(vec!["x".into()], vec![x]);
        let model = fit(&y, &ModelConfig::arimax(1, 1, 0), Some(&exog), &FitOptions::default()).unwrap();
        assert!(model.result().rmse > 0.0);
        assert!(matches!(
            model.forecast(1),
            Err(FitFailure::Config(ConfigError::ExogenousForecast(_)))
        ));
    }

    #[test]
    fn nan_input_is_rejected() {
        let mut y = noisy_walk(100, 2);
        y[50] = f64::NAN;
        let err = fit(&y, &ModelConfig::random_walk(), None, &FitOptions::default()).unwrap_err();
        assert_eq!(err, FitFailure::NonFiniteInput("samples"));
    }

    #[test]
    fn constant_series_is_singular() {
        let y = vec![2.0; 60];
        let err = fit(&y, &ModelConfig::white_noise(), None, &FitOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Singular);
    }

    #[test]
    fn recent_window_limits_train_size() {
        let y = noisy_walk(800, 4);
        let cfg = ModelConfig::random_walk().with_window(TrainWindow::Recent(500));
        let result = fit_result(&y, &cfg, None, &FitOptions::default()).unwrap();
        assert_eq!(result.train_size, 500);
    }

    #[test]
    fn zero_budget_times_out() {
        let y = noisy_walk(400, 6);
        let err = fit(
            &y,
            &ModelConfig::arima(2, 1, 2),
            None,
            &FitOptions::with_timeout(Duration::ZERO),
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::TimedOut);
    }

    #[test]
    fn iteration_cap_is_non_convergence() {
        let y = noisy_walk(300, 6);
        let options = FitOptions {
            timeout: None,
            max_iter: Some(1),
        };
        let err = fit(&y, &ModelConfig::arima(2, 1, 2), None, &options).unwrap_err();
        assert!(matches!(err, FitFailure::NonConvergence { iterations: 1 }));
    }

    #[test]
    fn fitting_is_deterministic() {
        let y = noisy_walk(300, 12);
        let cfg = ModelConfig::arima(2, 1, 2);
        let a = fit_result(&y, &cfg, None, &FitOptions::default());
        let b = fit_result(&y, &cfg, None, &FitOptions::default());
        assert_eq!(a, b);
    }
}
