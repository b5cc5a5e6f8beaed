//! Domain types for forecastlab

pub mod bar;
pub mod forecast;
pub mod series;

pub use bar::{PriceBar, Tick};
pub use forecast::{ForecastRow, PredictionColumn};
pub use series::{parse_date, resample_daily, PriceSeries, SeriesError, SeriesSummary};
