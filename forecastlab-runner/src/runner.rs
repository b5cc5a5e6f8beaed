//! Run orchestration — wires loading, features, comparison, forecasting,
//! metrics and signals together.
//!
//! Two entry points:
//! - `run_pipeline()`: loads the series described by the config, then runs. Used by the CLI.
//! - `run_from_series()`: takes a pre-loaded series. No file I/O.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use forecastlab_core::domain::{PriceSeries, SeriesSummary};
use forecastlab_core::features::{feature_importance, FeatureImportance, FeatureTable};
use forecastlab_core::signals::{trading_signals, SignalRecord};

use crate::cache::FeatureCache;
use crate::compare::{compare_models, CompareError, Comparison};
use crate::config::{RunConfig, RunConfigError};
use crate::data_loader::{load_series, LoadError, LoadedSeries};
use crate::future::{future_forecast, FutureError, FuturePoint};
use crate::metrics::{prediction_metrics, PredictionMetrics};
use crate::walk_forward::{walk_forward_forecast, WalkForward, WalkForwardError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] RunConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("series of {records} bars yields no feature rows (the first row needs {needed} bars of history)")]
    NoFeatureRows { records: usize, needed: usize },
    #[error("comparison failed: {0}")]
    Compare(#[from] CompareError),
    #[error("walk-forward failed: {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("future forecast failed: {0}")]
    Future(#[from] FutureError),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub source: String,
    pub is_synthetic: bool,
    pub summary: SeriesSummary,
    pub feature_rows: usize,
    /// Columns with a defined correlation, strongest first.
    pub importance: Vec<FeatureImportance>,
    /// Ranking over the training slice (rows up to `compare.train_end`).
    pub comparison: Comparison,
    pub walk_forward: WalkForward,
    pub metrics: Vec<PredictionMetrics>,
    pub future: Vec<FuturePoint>,
    pub signals: Vec<SignalRecord>,
    pub duration_secs: f64,
}

/// Load the configured series and run every stage.
///
/// Returns the report and the feature table it was computed from.
pub fn run_pipeline(
    config: &RunConfig,
    cache: &FeatureCache,
) -> Result<(RunReport, Arc<FeatureTable>), RunError> {
    config.validate().map_err(RunConfigError::from)?;
    let loaded = load_series(&config.data)?;
    run_from_series(&loaded, config, cache)
}

/// Run every stage on an already-loaded series.
pub fn run_from_series(
    loaded: &LoadedSeries,
    config: &RunConfig,
    cache: &FeatureCache,
) -> Result<(RunReport, Arc<FeatureTable>), RunError> {
    let started = Instant::now();
    let run_id = config.run_id()?;
    let series: &PriceSeries = &loaded.series;

    let table = cache.get_or_derive(series);
    if table.is_empty() {
        return Err(RunError::NoFeatureRows {
            records: series.len(),
            needed: forecastlab_core::features::FIRST_VALID_INDEX + 1,
        });
    }
    if loaded.is_synthetic {
        warn!("run uses synthetic data");
    }

    let training = table.until(config.compare.train_end);
    let comparison = compare_models(&training, &config.compare.grid, &config.compare.options)?;

    let walk_forward = walk_forward_forecast(&table, &config.forecast)?;
    let metrics = prediction_metrics(&walk_forward.rows);
    let signals = trading_signals(
        &walk_forward.rows,
        config.signals.column,
        &config.signals.thresholds,
    );
    let future = future_forecast(&table, &config.future)?;

    let importance = feature_importance(&table)
        .into_iter()
        .filter(|f| f.abs_correlation.is_finite())
        .collect();

    let report = RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        source: loaded.source.clone(),
        is_synthetic: loaded.is_synthetic,
        summary: series.summary(),
        feature_rows: table.len(),
        importance,
        comparison,
        walk_forward,
        metrics,
        future,
        signals,
        duration_secs: started.elapsed().as_secs_f64(),
    };
    info!(
        run_id = %report.run_id,
        feature_rows = report.feature_rows,
        duration_secs = report.duration_secs,
        "run complete"
    );
    Ok((report, table))
}
