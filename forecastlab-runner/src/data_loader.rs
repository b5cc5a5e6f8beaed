//! Price series loading for the runner.
//!
//! Resolution policy:
//! 1. `data.path` set and readable → parse CSV
//! 2. several files (`data.path` plus `data.paths`) → parse and concatenate
//! 3. path missing or unset and `data.synthetic` → generate a synthetic series (tagged)
//! 4. Otherwise → fail with a clear error
//!
//! CSV files need `date` or `timestamp`, `open`, `close` and `volume` columns
//! (header names are case-insensitive, extra columns ignored). Timestamps may
//! be ISO dates, ISO date-times or Unix seconds. Files with intraday
//! timestamps are resampled to daily bars; daily files are sorted and
//! de-duplicated keeping the first occurrence. Rows with an empty or
//! non-numeric price/volume field are dropped.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::{info, warn};

use forecastlab_core::domain::{resample_daily, PriceBar, PriceSeries, SeriesError, Tick};
use forecastlab_core::synthetic;

use crate::config::DataConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {0}")]
    NotFound(PathBuf),

    #[error("no data source: set data.path or enable --synthetic")]
    NoSource,

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}, line {line}: unparseable timestamp '{value}'")]
    BadTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("no usable rows in {0}")]
    NoRows(PathBuf),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// A loaded series plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: PriceSeries,
    pub source: String,
    pub is_synthetic: bool,
    /// Input rows dropped for missing or non-numeric values.
    pub dropped_rows: usize,
}

// ─── Resolution ──────────────────────────────────────────────────────

/// Load the series described by `config`, then apply its date filter.
pub fn load_series(config: &DataConfig) -> Result<LoadedSeries, LoadError> {
    let files: Vec<PathBuf> = config.path.iter().chain(&config.paths).cloned().collect();
    let loaded = match files.as_slice() {
        [] if !config.synthetic => return Err(LoadError::NoSource),
        [path] if path.exists() => load_csv(path)?,
        [path] if !config.synthetic => return Err(LoadError::NotFound(path.clone())),
        [] | [_] => synthetic_series(config)?,
        many => load_csv_files(many)?,
    };

    let series = filter_dates(&loaded.series, config.start, config.end)?;
    let summary = series.summary();
    info!(
        source = %loaded.source,
        records = summary.total_records,
        start = %summary.start,
        end = %summary.end,
        dropped = loaded.dropped_rows,
        "price series loaded"
    );
    Ok(LoadedSeries { series, ..loaded })
}

fn synthetic_series(config: &DataConfig) -> Result<LoadedSeries, LoadError> {
    warn!(
        label = %config.synthetic_label,
        days = config.synthetic_days,
        "using synthetic price series; results are not real market data"
    );
    let series =
        synthetic::random_walk_series(&config.synthetic_label, config.synthetic_days, 30_000.0, 0.03)?;
    Ok(LoadedSeries {
        series,
        source: format!("synthetic:{}", config.synthetic_label),
        is_synthetic: true,
        dropped_rows: 0,
    })
}

/// Bars dated within `[start, end]` (either bound optional, both inclusive).
pub fn filter_dates(
    series: &PriceSeries,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<PriceSeries, SeriesError> {
    if start.is_none() && end.is_none() {
        return Ok(series.clone());
    }
    let bars: Vec<PriceBar> = series
        .bars()
        .iter()
        .filter(|b| start.map_or(true, |s| b.date >= s) && end.map_or(true, |e| b.date <= e))
        .copied()
        .collect();
    PriceSeries::new(bars)
}

// ─── CSV parsing ─────────────────────────────────────────────────────

struct Columns {
    timestamp: usize,
    open: usize,
    close: usize,
    volume: usize,
}

fn locate_columns(headers: &csv::StringRecord, path: &Path) -> Result<Columns, LoadError> {
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let missing = |column| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column,
    };
    Ok(Columns {
        timestamp: find(&["date", "timestamp"]).ok_or_else(|| missing("date"))?,
        open: find(&["open"]).ok_or_else(|| missing("open"))?,
        close: find(&["close"]).ok_or_else(|| missing("close"))?,
        volume: find(&["volume"]).ok_or_else(|| missing("volume"))?,
    })
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]`, RFC 3339 or integer Unix seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
}

fn parse_field(record: &csv::StringRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Load one CSV file into a daily series.
pub fn load_csv(path: &Path) -> Result<LoadedSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let cols = locate_columns(&headers, path)?;

    let mut ticks = Vec::new();
    let mut dropped_rows = 0;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let raw = record.get(cols.timestamp).unwrap_or("");
        let timestamp = parse_timestamp(raw).ok_or_else(|| LoadError::BadTimestamp {
            path: path.to_path_buf(),
            line,
            value: raw.to_string(),
        })?;

        match (
            parse_field(&record, cols.open),
            parse_field(&record, cols.close),
            parse_field(&record, cols.volume),
        ) {
            (Some(open), Some(close), Some(volume)) => ticks.push(Tick {
                timestamp,
                open,
                close,
                volume,
            }),
            _ => dropped_rows += 1,
        }
    }

    if ticks.is_empty() {
        return Err(LoadError::NoRows(path.to_path_buf()));
    }
    if dropped_rows > 0 {
        warn!(path = %path.display(), dropped_rows, "dropped rows with missing values");
    }

    let intraday = ticks.iter().any(|t| t.timestamp.time() != NaiveTime::MIN);
    let series = if intraday {
        resample_daily(&ticks)?
    } else {
        let bars = ticks
            .iter()
            .map(|t| PriceBar::new(t.timestamp.date(), t.open, t.close, t.volume))
            .collect();
        PriceSeries::from_unsorted(bars)?
    };

    Ok(LoadedSeries {
        series,
        source: path.display().to_string(),
        is_synthetic: false,
        dropped_rows,
    })
}

/// Load and concatenate several files (e.g. one per year). Missing files are
/// skipped with a warning; at least one must load.
pub fn load_csv_files(paths: &[PathBuf]) -> Result<LoadedSeries, LoadError> {
    let mut bars = Vec::new();
    let mut sources = Vec::new();
    let mut dropped_rows = 0;
    for path in paths {
        if !path.exists() {
            warn!(path = %path.display(), "data file not found, skipping");
            continue;
        }
        let loaded = load_csv(path)?;
        bars.extend_from_slice(loaded.series.bars());
        sources.push(loaded.source);
        dropped_rows += loaded.dropped_rows;
    }
    if sources.is_empty() {
        return Err(LoadError::NoSource);
    }
    Ok(LoadedSeries {
        series: PriceSeries::from_unsorted(bars)?,
        source: sources.join(","),
        is_synthetic: false,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_timestamp_formats() {
        assert_eq!(parse_timestamp("2021-10-01").unwrap().date(), d(2021, 10, 1));
        assert_eq!(parse_timestamp("1633046400").unwrap().date(), d(2021, 10, 1));
        assert_eq!(
            parse_timestamp("2021-10-01 13:45:00").unwrap().time(),
            NaiveTime::from_hms_opt(13, 45, 0).unwrap()
        );
        assert!(parse_timestamp("2021-10-01T00:00:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn daily_file_is_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "daily.csv",
            "Date,Open,High,Close,Volume\n\
             2021-01-03,3,9,3.5,30\n\
             2021-01-01,1,9,1.5,10\n\
             2021-01-02,2,9,2.5,20\n\
             2021-01-01,7,9,7.5,70\n",
        );
        let loaded = load_csv(&path).unwrap();
        let bars = loaded.series.bars();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(2021, 1, 1));
        assert_eq!(bars[0].close, 1.5);
        assert_eq!(bars[2].close, 3.5);
        assert!(!loaded.is_synthetic);
    }

    #[test]
    fn intraday_file_is_resampled() {
        let dir = tempfile::tempdir().unwrap();
        // 2021-10-01 00:00, 12:00 and 2021-10-02 00:00 UTC.
        let path = write_csv(
            &dir,
            "ticks.csv",
            "timestamp,open,close,volume\n\
             1633046400,100,101,5\n\
             1633089600,101,104,7\n\
             1633132800,104,103,2\n",
        );
        let bars = load_csv(&path).unwrap().series.bars().to_vec();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 104.0);
        assert_eq!(bars[0].volume, 12.0);
        assert_eq!(bars[1].date, d(2021, 10, 2));
    }

    #[test]
    fn rows_with_missing_values_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "gaps.csv",
            "date,open,close,volume\n2021-01-01,1,1,1\n2021-01-02,,2,2\n2021-01-03,3,3,3\n",
        );
        let loaded = load_csv(&path).unwrap();
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.dropped_rows, 1);
    }

    #[test]
    fn missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "bad.csv", "date,open,volume\n2021-01-01,1,1\n");
        assert!(matches!(
            load_csv(&path),
            Err(LoadError::MissingColumn { column: "close", .. })
        ));
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "ts.csv", "date,open,close,volume\nsoon,1,1,1\n");
        assert!(matches!(load_csv(&path), Err(LoadError::BadTimestamp { .. })));
    }

    #[test]
    fn synthetic_fallback_and_filter() {
        let config = DataConfig {
            path: Some(PathBuf::from("/nonexistent/prices.csv")),
            synthetic: true,
            synthetic_days: 100,
            start: Some(synthetic::synthetic_start() + chrono::Duration::days(10)),
            end: Some(synthetic::synthetic_start() + chrono::Duration::days(19)),
            ..DataConfig::default()
        };
        let loaded = load_series(&config).unwrap();
        assert!(loaded.is_synthetic);
        assert_eq!(loaded.series.len(), 10);
    }

    #[test]
    fn no_source_without_synthetic() {
        assert!(matches!(load_series(&DataConfig::default()), Err(LoadError::NoSource)));
        let config = DataConfig {
            path: Some(PathBuf::from("/nonexistent/prices.csv")),
            ..DataConfig::default()
        };
        assert!(matches!(load_series(&config), Err(LoadError::NotFound(_))));
    }

    #[test]
    fn multiple_files_concatenate() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_csv(&dir, "a.csv", "date,open,close,volume\n2020-12-31,1,1,1\n");
        let b = write_csv(&dir, "b.csv", "date,open,close,volume\n2021-01-01,2,2,2\n");
        let missing = dir.path().join("c.csv");
        let loaded = load_csv_files(&[b.clone(), missing, a.clone()]).unwrap();
        assert_eq!(loaded.series.len(), 2);
        assert_eq!(loaded.series.first_date(), d(2020, 12, 31));

        let config = DataConfig {
            path: Some(b),
            paths: vec![a],
            ..DataConfig::default()
        };
        let loaded = load_series(&config).unwrap();
        assert!(!loaded.is_synthetic);
        assert_eq!(loaded.series.last_date(), d(2021, 1, 1));
    }
}
