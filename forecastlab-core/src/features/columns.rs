//! Logical feature names and their mapping onto `FeatureRow` fields.
//!
//! Rows are typed structs; `FeatureColumn` is the generic access path used by
//! exogenous-matrix construction, feature importance and tabular export.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FeatureRow;

/// Trailing windows for SMA, distance-from-SMA, momentum and volatility.
pub const PRICE_WINDOWS: [usize; 4] = [7, 30, 50, 200];

/// Trailing windows for the volume moving averages.
pub const VOLUME_WINDOWS: [usize; 4] = [7, 14, 30, 50];

/// Number of lagged log-close features.
pub const CLOSE_LAGS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureColumn {
    LogOpen,
    LogClose,
    Return,
    /// Lag in days, 1..=7.
    ClosePrior(usize),
    Sma(usize),
    DistSma(usize),
    Momentum(usize),
    Volatility(usize),
    VolumeMa(usize),
    Open,
    /// Same-day close, carried through for actual-vs-predicted comparisons.
    Close,
    /// Previous day's volume.
    Volume,
}

impl FeatureColumn {
    /// Every column the pipeline produces, in export order.
    pub fn all() -> Vec<FeatureColumn> {
        let mut cols = vec![Self::LogOpen, Self::LogClose, Self::Return];
        cols.extend((1..=CLOSE_LAGS).map(Self::ClosePrior));
        cols.extend(PRICE_WINDOWS.iter().map(|&w| Self::Sma(w)));
        cols.extend(PRICE_WINDOWS.iter().map(|&w| Self::DistSma(w)));
        cols.extend(PRICE_WINDOWS.iter().map(|&w| Self::Momentum(w)));
        cols.extend(PRICE_WINDOWS.iter().map(|&w| Self::Volatility(w)));
        cols.extend(VOLUME_WINDOWS.iter().map(|&w| Self::VolumeMa(w)));
        cols.extend([Self::Open, Self::Close, Self::Volume]);
        cols
    }

    /// Regressors for exogenous-augmented models: everything except the
    /// target (`log_close`) and the close passthrough.
    pub fn exogenous() -> Vec<FeatureColumn> {
        Self::all()
            .into_iter()
            .filter(|c| !c.is_target_derived())
            .collect()
    }

    pub fn is_target_derived(self) -> bool {
        matches!(self, Self::LogClose | Self::Close)
    }

    pub fn name(self) -> String {
        match self {
            Self::LogOpen => "log_open".into(),
            Self::LogClose => "log_close".into(),
            Self::Return => "return".into(),
            Self::ClosePrior(lag) => format!("close_{lag}_prior"),
            Self::Sma(w) => format!("sma_{w}"),
            Self::DistSma(w) => format!("dist_sma_{w}"),
            Self::Momentum(w) => format!("momentum_{w}"),
            Self::Volatility(w) => format!("volatility_{w}"),
            Self::VolumeMa(w) => format!("volume_{w}"),
            Self::Open => "open".into(),
            Self::Close => "close".into(),
            Self::Volume => "volume".into(),
        }
    }

    /// Read this column from a row. `None` for a lag or window the pipeline
    /// does not produce.
    pub fn value(self, row: &FeatureRow) -> Option<f64> {
        let price_idx = |w: usize| PRICE_WINDOWS.iter().position(|&x| x == w);
        match self {
            Self::LogOpen => Some(row.log_open),
            Self::LogClose => Some(row.log_close),
            Self::Return => Some(row.log_return),
            Self::ClosePrior(lag) if (1..=CLOSE_LAGS).contains(&lag) => {
                Some(row.close_prior[lag - 1])
            }
            Self::ClosePrior(_) => None,
            Self::Sma(w) => price_idx(w).map(|i| row.sma[i]),
            Self::DistSma(w) => price_idx(w).map(|i| row.dist_sma[i]),
            Self::Momentum(w) => price_idx(w).map(|i| row.momentum[i]),
            Self::Volatility(w) => price_idx(w).map(|i| row.volatility[i]),
            Self::VolumeMa(w) => VOLUME_WINDOWS
                .iter()
                .position(|&x| x == w)
                .map(|i| row.volume_ma[i]),
            Self::Open => Some(row.open),
            Self::Close => Some(row.close),
            Self::Volume => Some(row.volume),
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for FeatureColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown feature column '{s}'"))
    }
}
