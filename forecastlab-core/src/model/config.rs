//! Model configuration — family, (p, d, q) order, trend flag, training window.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest AR / MA lag count accepted.
pub const MAX_ARMA_ORDER: usize = 10;

/// Largest differencing degree accepted.
pub const MAX_DIFFERENCING: usize = 3;

/// Configuration errors. Rejected before dispatch to the fitter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("order ({p},{d},{q}) out of range: p,q <= {MAX_ARMA_ORDER}, d <= {MAX_DIFFERENCING}")]
    OrderOutOfRange { p: usize, d: usize, q: usize },

    #[error("{family} requires order {expected}, got {actual}")]
    FamilyOrderMismatch {
        family: ModelFamily,
        expected: String,
        actual: Order,
    },

    #[error("training window must contain at least one observation")]
    EmptyWindow,

    #[error("invalid order '{input}': expected three non-negative integers 'p,d,q'")]
    InvalidOrder { input: String },

    #[error("{0} needs future regressor values and cannot forecast beyond the data")]
    ExogenousForecast(ModelFamily),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// ARIMA order: AR lags, differencing degree, MA lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Order {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Parse `"p,d,q"` (parentheses and whitespace tolerated).
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidOrder {
            input: input.to_string(),
        };
        let trimmed = input.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let mut values = [0usize; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse::<usize>().map_err(|_| invalid())?;
        }
        Ok(Self::new(values[0], values[1], values[2]))
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

impl FromStr for Order {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The supported autoregressive-integrated-moving-average families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    WhiteNoise,
    RandomWalk,
    RandomWalkDrift,
    Arma,
    Arima,
    Arimax,
}

impl ModelFamily {
    pub fn label(self) -> &'static str {
        match self {
            Self::WhiteNoise => "white noise",
            Self::RandomWalk => "random walk",
            Self::RandomWalkDrift => "random walk drift",
            Self::Arma => "ARMA",
            Self::Arima => "ARIMA",
            Self::Arimax => "ARIMAX",
        }
    }

    pub fn uses_exogenous(self) -> bool {
        matches!(self, Self::Arimax)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How much history a fit sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainWindow {
    Full,
    /// The most recent `n` observations.
    Recent(usize),
}

impl TrainWindow {
    /// Slice bounds `[start, len)` selected from a series of `len` observations.
    pub fn start_index(self, len: usize) -> usize {
        match self {
            Self::Full => 0,
            Self::Recent(n) => len.saturating_sub(n),
        }
    }
}

impl fmt::Display for TrainWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Recent(n) => write!(f, "recent {n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelConfig {
    pub family: ModelFamily,
    pub order: Order,
    /// Include a constant: the mean for d = 0, the drift for d >= 1.
    pub trend: bool,
    pub window: TrainWindow,
}

impl ModelConfig {
    pub fn white_noise() -> Self {
        Self::build(ModelFamily::WhiteNoise, Order::new(0, 0, 0), true)
    }

    pub fn random_walk() -> Self {
        Self::build(ModelFamily::RandomWalk, Order::new(0, 1, 0), false)
    }

    pub fn random_walk_drift() -> Self {
        Self::build(ModelFamily::RandomWalkDrift, Order::new(0, 1, 0), true)
    }

    pub fn arma(p: usize, q: usize) -> Self {
        Self::build(ModelFamily::Arma, Order::new(p, 0, q), true)
    }

    pub fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::build(ModelFamily::Arima, Order::new(p, d, q), false)
    }

    pub fn arimax(p: usize, d: usize, q: usize) -> Self {
        Self::build(ModelFamily::Arimax, Order::new(p, d, q), false)
    }

    /// A plain ARIMA configuration for an arbitrary order, as used by the
    /// forecasting operations.
    pub fn from_order(order: Order) -> Self {
        Self::arima(order.p, order.d, order.q)
    }

    fn build(family: ModelFamily, order: Order, trend: bool) -> Self {
        Self {
            family,
            order,
            trend,
            window: TrainWindow::Full,
        }
    }

    pub fn with_window(mut self, window: TrainWindow) -> Self {
        self.window = window;
        self
    }

    /// Reject out-of-range orders and family/order combinations that do not
    /// describe the family.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Order { p, d, q } = self.order;
        if p > MAX_ARMA_ORDER || q > MAX_ARMA_ORDER || d > MAX_DIFFERENCING {
            return Err(ConfigError::OrderOutOfRange { p, d, q });
        }
        if self.window == TrainWindow::Recent(0) {
            return Err(ConfigError::EmptyWindow);
        }

        let fixed = match self.family {
            ModelFamily::WhiteNoise => Some(Order::new(0, 0, 0)),
            ModelFamily::RandomWalk | ModelFamily::RandomWalkDrift => Some(Order::new(0, 1, 0)),
            _ => None,
        };
        if let Some(expected) = fixed {
            if self.order != expected {
                return Err(ConfigError::FamilyOrderMismatch {
                    family: self.family,
                    expected: expected.to_string(),
                    actual: self.order,
                });
            }
        }
        if self.family == ModelFamily::Arma && d != 0 {
            return Err(ConfigError::FamilyOrderMismatch {
                family: self.family,
                expected: "(p,0,q)".into(),
                actual: self.order,
            });
        }
        if self.family == ModelFamily::RandomWalkDrift && !self.trend {
            return Err(ConfigError::Invalid(
                "random walk with drift requires the trend flag".into(),
            ));
        }
        Ok(())
    }

    /// Validation for operations that project beyond the last observation.
    pub fn validate_for_forecast(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.family.uses_exogenous() {
            return Err(ConfigError::ExogenousForecast(self.family));
        }
        Ok(())
    }

    /// Human-readable label, e.g. `ARIMA (2,1,2)`.
    pub fn label(&self) -> String {
        let mut label = format!("{} {}", self.family, self.order);
        if self.trend && !matches!(self.family, ModelFamily::RandomWalkDrift | ModelFamily::WhiteNoise | ModelFamily::Arma) {
            label.push_str(" +trend");
        }
        label
    }
}
