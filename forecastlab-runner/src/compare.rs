//! Grid Comparator — fit a fixed enumeration of model configurations and
//! rank the ones that succeed.
//!
//! Every configuration is an independent fit over the same read-only series,
//! so the grid runs on the rayon pool. Failures are collected per kind and
//! left out of the ranking.

use std::collections::BTreeMap;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use forecastlab_core::features::FeatureTable;
use forecastlab_core::model::{
    fit_result, ConfigError, ExogenousMatrix, FailureKind, FitFailure, FitOptions, FitResult,
    ModelConfig, TrainWindow,
};

// ─── Configuration ───────────────────────────────────────────────────

/// Which configurations the comparator enumerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelGrid {
    /// AR orders for ARMA / ARIMA / ARIMAX.
    pub ar_orders: Vec<usize>,
    /// Differencing degrees for ARIMA / ARIMAX.
    pub diff_orders: Vec<usize>,
    /// MA orders for ARMA / ARIMA / ARIMAX.
    pub ma_orders: Vec<usize>,
    pub include_baselines: bool,
    pub include_arma: bool,
    pub include_arima: bool,
    pub include_arimax: bool,
}

impl Default for ModelGrid {
    fn default() -> Self {
        Self {
            ar_orders: vec![0, 1, 2],
            diff_orders: vec![1, 2, 3],
            ma_orders: vec![0, 1, 2],
            include_baselines: true,
            include_arma: true,
            include_arima: true,
            include_arimax: true,
        }
    }
}

impl ModelGrid {
    /// Every configuration for a history of `history_len` observations.
    ///
    /// Baselines (white noise, random walk, random walk with drift) are also
    /// evaluated on the most recent `reduced_window` observations, but only
    /// when the history is longer than that window; otherwise the reduced run
    /// would duplicate the full one.
    pub fn configs(&self, history_len: usize, reduced_window: usize) -> Vec<ModelConfig> {
        let mut configs = Vec::new();

        if self.include_baselines {
            let baselines = [
                ModelConfig::white_noise(),
                ModelConfig::random_walk(),
                ModelConfig::random_walk_drift(),
            ];
            configs.extend(baselines);
            if reduced_window > 0 && history_len > reduced_window {
                configs.extend(
                    baselines
                        .iter()
                        .map(|c| c.with_window(TrainWindow::Recent(reduced_window))),
                );
            }
        }

        if self.include_arma {
            for &p in &self.ar_orders {
                for &q in &self.ma_orders {
                    configs.push(ModelConfig::arma(p, q));
                }
            }
        }

        for (enabled, build) in [
            (self.include_arima, ModelConfig::arima as fn(usize, usize, usize) -> ModelConfig),
            (self.include_arimax, ModelConfig::arimax),
        ] {
            if !enabled {
                continue;
            }
            for &p in &self.ar_orders {
                for &d in &self.diff_orders {
                    for &q in &self.ma_orders {
                        configs.push(build(p, d, q));
                    }
                }
            }
        }

        configs
    }

    /// Reject a grid that enumerates nothing or contains an invalid order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let configs = self.configs(0, 0);
        if configs.is_empty() {
            return Err(ConfigError::Invalid("compare.grid enumerates no models".into()));
        }
        configs.iter().try_for_each(ModelConfig::validate)
    }
}

/// Execution options for a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Run configurations on the rayon pool.
    pub parallel: bool,
    /// Wall-clock budget per configuration, in seconds. `None` = unbounded.
    pub fit_timeout_secs: Option<f64>,
    /// Size of the reduced baseline window.
    pub reduced_window: usize,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            fit_timeout_secs: None,
            reduced_window: 500,
        }
    }
}

impl CompareOptions {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            timeout: self
                .fit_timeout_secs
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64),
            max_iter: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// A configuration that could not be fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFit {
    pub config: ModelConfig,
    pub kind: FailureKind,
    pub reason: String,
}

/// Ranked successes plus an account of everything that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Sorted by train_size descending, then RMSE ascending.
    pub ranking: Vec<FitResult>,
    pub failures: Vec<FailedFit>,
    pub failure_counts: BTreeMap<FailureKind, usize>,
    pub attempted: usize,
}

impl Comparison {
    pub fn best(&self) -> Option<&FitResult> {
        self.ranking.first()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("feature table is empty")]
    EmptyInput,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("none of {attempted} configurations could be fitted ({})", summarize(.failure_counts))]
    NoSuccessfulFits {
        attempted: usize,
        failure_counts: BTreeMap<FailureKind, usize>,
    },
}

fn summarize(counts: &BTreeMap<FailureKind, usize>) -> String {
    counts
        .iter()
        .map(|(kind, n)| format!("{kind}: {n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ─── Comparison ──────────────────────────────────────────────────────

/// Sort key: larger windows first, then lower RMSE. Stable, so equal keys
/// keep enumeration order.
pub fn rank(results: &mut [FitResult]) {
    results.sort_by(|a, b| {
        b.train_size
            .cmp(&a.train_size)
            .then_with(|| a.rmse.total_cmp(&b.rmse))
    });
}

/// Compare the default grid on a feature table's log closes, with its
/// exogenous columns for the ARIMAX family.
pub fn compare_models(
    table: &FeatureTable,
    grid: &ModelGrid,
    options: &CompareOptions,
) -> Result<Comparison, CompareError> {
    if table.is_empty() {
        return Err(CompareError::EmptyInput);
    }
    let samples = table.log_closes();
    let exog = grid.include_arimax.then(|| table.exogenous_matrix());
    compare_series(&samples, exog.as_ref(), grid, options)
}

/// Compare the grid on an arbitrary target series.
pub fn compare_series(
    samples: &[f64],
    exog: Option<&ExogenousMatrix>,
    grid: &ModelGrid,
    options: &CompareOptions,
) -> Result<Comparison, CompareError> {
    if samples.is_empty() {
        return Err(CompareError::EmptyInput);
    }
    grid.validate()?;
    let configs = grid.configs(samples.len(), options.reduced_window);
    let fit_options = options.fit_options();

    let run = |config: &ModelConfig| -> (ModelConfig, Result<FitResult, FitFailure>) {
        let outcome = fit_result(samples, config, exog, &fit_options);
        if let Err(failure) = &outcome {
            debug!(
                model = %config.label(),
                window = %config.window,
                kind = %failure.kind(),
                %failure,
                "fit failed"
            );
        }
        (*config, outcome)
    };

    let outcomes: Vec<(ModelConfig, Result<FitResult, FitFailure>)> = if options.parallel {
        configs.par_iter().map(run).collect()
    } else {
        configs.iter().map(run).collect()
    };

    let attempted = outcomes.len();
    let mut ranking = Vec::new();
    let mut failures = Vec::new();
    let mut failure_counts: BTreeMap<FailureKind, usize> = BTreeMap::new();
    for (config, outcome) in outcomes {
        match outcome {
            Ok(result) => ranking.push(result),
            Err(failure) => {
                *failure_counts.entry(failure.kind()).or_default() += 1;
                failures.push(FailedFit {
                    config,
                    kind: failure.kind(),
                    reason: failure.to_string(),
                });
            }
        }
    }

    if ranking.is_empty() {
        return Err(CompareError::NoSuccessfulFits {
            attempted,
            failure_counts,
        });
    }
    rank(&mut ranking);

    info!(
        attempted,
        succeeded = ranking.len(),
        failed = failures.len(),
        best = %ranking[0].config.label(),
        "model comparison complete"
    );

    Ok(Comparison {
        ranking,
        failures,
        failure_counts,
        attempted,
    })
}
