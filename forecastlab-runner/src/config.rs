//! Run configuration loaded from TOML.
//!
//! A `RunConfig` captures every parameter needed to reproduce a run:
//! - where the price series comes from (`[data]`)
//! - the comparison grid and training cut-off (`[compare]`)
//! - walk-forward and future forecast settings (`[forecast]`, `[future]`)
//! - signal column and thresholds (`[signals]`)
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forecastlab_core::domain::PredictionColumn;
use forecastlab_core::model::ConfigError;
use forecastlab_core::signals::SignalThresholds;

use crate::compare::{CompareOptions, ModelGrid};
use crate::future::FutureConfig;
use crate::walk_forward::WalkForwardConfig;

/// Content hash of a serialized [`RunConfig`].
pub type RunId = String;

fn default_split_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 10, 1).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── Sections ────────────────────────────────────────────────────────

/// Price series source and date filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with `date|timestamp, open, close, volume` columns.
    pub path: Option<PathBuf>,
    /// More CSV files (e.g. one per year), concatenated with `path`.
    pub paths: Vec<PathBuf>,
    /// Generate a synthetic series instead of (or when missing) `path`.
    pub synthetic: bool,
    pub synthetic_label: String,
    pub synthetic_days: usize,
    /// Inclusive date filter applied after loading.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            paths: Vec::new(),
            synthetic: false,
            synthetic_label: "BTC".into(),
            synthetic_days: 1200,
            start: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Last date (inclusive) of the training slice the comparator sees.
    pub train_end: NaiveDate,
    pub options: CompareOptions,
    pub grid: ModelGrid,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            train_end: default_split_date(),
            options: CompareOptions::default(),
            grid: ModelGrid::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub column: PredictionColumn,
    #[serde(flatten)]
    pub thresholds: SignalThresholds,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            column: PredictionColumn::Tomorrow,
            thresholds: SignalThresholds::default(),
        }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataConfig,
    pub compare: CompareConfig,
    pub forecast: WalkForwardConfig,
    pub future: FutureConfig,
    pub signals: SignalConfig,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RunConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, RunConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, RunConfigError> {
        toml::to_string_pretty(self).map_err(|e| RunConfigError::Serialize(e.to_string()))
    }

    /// Reject inconsistent settings before any data is loaded or fitted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.data.start, self.data.end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "data.start {start} is after data.end {end}"
                )));
            }
        }
        if self.data.synthetic && self.data.synthetic_days == 0 {
            return Err(ConfigError::Invalid("data.synthetic_days must be positive".into()));
        }

        self.compare.grid.validate()?;
        self.forecast.validate()?;
        self.future.validate()?;

        let t = self.signals.thresholds;
        if !(t.buy_above.is_finite() && t.sell_below.is_finite()) || t.sell_below > t.buy_above {
            return Err(ConfigError::Invalid(format!(
                "signal thresholds must be finite with sell_below <= buy_above, got {} / {}",
                t.sell_below, t.buy_above
            )));
        }
        Ok(())
    }

    /// BLAKE3 over the JSON serialization. Identical configurations share an id.
    pub fn run_id(&self) -> Result<RunId, RunConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| RunConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecastlab_core::model::Order;

    #[test]
    fn empty_file_is_default() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.compare.train_end, default_split_date());
        assert_eq!(config.forecast.order, Order::new(2, 1, 2));
        assert_eq!(config.forecast.horizon_days, 30);
        assert_eq!(config.forecast.min_history, 10);
        assert_eq!(config.future.days_ahead, 7);
        assert_eq!(config.compare.options.reduced_window, 500);
        assert_eq!(config.signals.column, PredictionColumn::Tomorrow);
    }

    #[test]
    fn parses_sections() {
        let toml = r#"
            [data]
            synthetic = true
            synthetic_days = 600
            start = "2020-01-01"

            [compare]
            train_end = "2021-06-30"

            [compare.grid]
            include_arimax = false
            ar_orders = [0, 1]

            [forecast]
            start_date = "2021-07-01"
            horizon_days = 10
            order = { p = 1, d = 1, q = 0 }

            [future]
            days_ahead = 5

            [signals]
            column = "pred_today"
            buy_above = 2.0
            sell_below = -2.0
        "#;
        let config = RunConfig::from_toml_str(toml).unwrap();
        assert!(config.data.synthetic);
        assert_eq!(config.data.synthetic_days, 600);
        assert_eq!(config.data.start, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert!(!config.compare.grid.include_arimax);
        assert_eq!(config.compare.grid.ar_orders, vec![0, 1]);
        assert_eq!(config.compare.grid.ma_orders, vec![0, 1, 2]);
        assert_eq!(config.forecast.order, Order::new(1, 1, 0));
        assert_eq!(config.forecast.horizon_days, 10);
        assert_eq!(config.future.days_ahead, 5);
        assert_eq!(config.signals.column, PredictionColumn::Today);
        assert_eq!(config.signals.thresholds.buy_above, 2.0);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = RunConfig::default();
        config.data.path = Some(PathBuf::from("data/btc.csv"));
        config.forecast.fit_timeout_secs = Some(5.0);
        let text = config.to_toml_string().unwrap();
        assert_eq!(RunConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let toml = "[signals]\nbuy_above = -1.0\nsell_below = 1.0\n";
        assert!(matches!(
            RunConfig::from_toml_str(toml),
            Err(RunConfigError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn rejects_out_of_range_order() {
        let toml = "[forecast]\norder = { p = 11, d = 1, q = 0 }\n";
        assert!(matches!(
            RunConfig::from_toml_str(toml),
            Err(RunConfigError::Config(ConfigError::OrderOutOfRange { .. }))
        ));
    }

    #[test]
    fn rejects_empty_grid() {
        let toml = "[compare.grid]\ninclude_baselines = false\nar_orders = []\n";
        assert!(RunConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn rejects_out_of_range_grid_order() {
        let toml = "[compare.grid]\nar_orders = [0, 11]\n";
        assert!(matches!(
            RunConfig::from_toml_str(toml),
            Err(RunConfigError::Config(ConfigError::OrderOutOfRange { p: 11, .. }))
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            RunConfig::from_toml_str("[forecast\n"),
            Err(RunConfigError::Parse(_))
        ));
    }

    #[test]
    fn run_id_deterministic_and_sensitive() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(a.run_id().unwrap(), b.run_id().unwrap());
        b.future.days_ahead = 8;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RunConfig::from_path(Path::new("/nonexistent/forecastlab.toml")).unwrap_err();
        assert!(matches!(err, RunConfigError::Io { .. }));
    }
}
