//! Reporting and export — JSON, CSV, Parquet and Markdown artifacts.
//!
//! - **JSON**: full `RunReport` round-trip with schema versioning
//! - **CSV**: ranking, forecast, signal and future tables
//! - **Parquet**: the derived feature table, one column per logical feature
//! - **Markdown**: a human-readable run summary

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use polars::prelude::*;

use forecastlab_core::domain::ForecastRow;
use forecastlab_core::features::{FeatureColumn, FeatureTable};
use forecastlab_core::model::FitResult;
use forecastlab_core::signals::{signal_counts, SignalRecord};

use crate::future::FuturePoint;
use crate::runner::{RunReport, SCHEMA_VERSION};

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: model_type, train_size, order, aic, rmse
pub fn export_ranking_csv(ranking: &[FitResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["model_type", "train_size", "order", "aic", "rmse"])?;
    for r in ranking {
        wtr.write_record([
            r.config.family.label().to_string(),
            r.train_size.to_string(),
            r.config.order.to_string(),
            format!("{:.4}", r.aic),
            format!("{:.6}", r.rmse),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, close, pred_today, pred_tomorrow, pred_2_days.
/// Invalid predictions are written as empty fields.
pub fn export_forecast_csv(rows: &[ForecastRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "close", "pred_today", "pred_tomorrow", "pred_2_days"])?;
    for r in rows {
        wtr.write_record([
            r.date.to_string(),
            format!("{:.6}", r.close),
            opt(r.pred_today),
            opt(r.pred_tomorrow),
            opt(r.pred_2_days),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, actual_close, predicted_close, expected_change_pct, signal
pub fn export_signals_csv(records: &[SignalRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "actual_close",
        "predicted_close",
        "expected_change_pct",
        "signal",
    ])?;
    for s in records {
        wtr.write_record([
            s.date.to_string(),
            format!("{:.6}", s.actual_close),
            opt(s.predicted_close),
            opt(s.expected_change_pct),
            s.signal.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: date, predicted_price, log_predicted_price
pub fn export_future_csv(points: &[FuturePoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "predicted_price", "log_predicted_price"])?;
    for p in points {
        wtr.write_record([
            p.date.to_string(),
            format!("{:.6}", p.predicted_price),
            format!("{:.8}", p.log_predicted_price),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Parquet export ─────────────────────────────────────────────────

/// Feature table as a DataFrame: `date` plus every [`FeatureColumn`].
pub fn features_to_dataframe(table: &FeatureTable) -> Result<DataFrame> {
    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1).context("epoch date")?;
    let dates: Vec<i32> = table
        .rows()
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();

    let mut columns = vec![Column::new("date".into(), dates)
        .cast(&DataType::Date)
        .context("date cast")?];
    for feature in FeatureColumn::all() {
        let values: Vec<Option<f64>> = table.rows().iter().map(|r| feature.value(r)).collect();
        columns.push(Column::new(feature.name().into(), values));
    }
    DataFrame::new(columns).context("dataframe creation")
}

pub fn write_features_parquet(table: &FeatureTable, path: &Path) -> Result<()> {
    let mut df = features_to_dataframe(table)?;
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("failed to write parquet {}", path.display()))?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set under `output_dir/{run_id prefix}/`:
/// - `report.json`, `report.md`
/// - `ranking.csv`, `forecast.csv`, `signals.csv`, `future.csv`
/// - `features.parquet`
///
/// Returns the created directory.
pub fn save_artifacts(report: &RunReport, table: &FeatureTable, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(prefix);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let write = |name: &str, content: String| -> Result<()> {
        let path = run_dir.join(name);
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))
    };
    write("report.json", export_json(report)?)?;
    write("report.md", generate_report(report))?;
    write("ranking.csv", export_ranking_csv(&report.comparison.ranking)?)?;
    write("forecast.csv", export_forecast_csv(&report.walk_forward.rows)?)?;
    write("signals.csv", export_signals_csv(&report.signals)?)?;
    write("future.csv", export_future_csv(&report.future)?)?;
    write_features_parquet(table, &run_dir.join("features.parquet"))?;

    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(report: &RunReport) -> String {
    let mut md = String::new();
    let s = &report.summary;

    md.push_str("# Forecast run\n\n");
    md.push_str(&format!("- Run id: `{}`\n", report.run_id));
    md.push_str(&format!("- Source: {}", report.source));
    if report.is_synthetic {
        md.push_str(" (synthetic)");
    }
    md.push('\n');
    md.push_str(&format!(
        "- Records: {} ({} to {}), {} feature rows\n",
        s.total_records, s.start, s.end, report.feature_rows
    ));
    md.push_str(&format!(
        "- Close: min {:.2}, max {:.2}, mean {:.2}, std {:.2}\n\n",
        s.close_min, s.close_max, s.close_mean, s.close_std
    ));

    md.push_str("## Model comparison\n\n");
    md.push_str(&format!(
        "{} attempted, {} ranked, {} failed\n\n",
        report.comparison.attempted,
        report.comparison.ranking.len(),
        report.comparison.failed()
    ));
    md.push_str("| Model | Train size | AIC | RMSE |\n|---|---:|---:|---:|\n");
    for r in report.comparison.ranking.iter().take(10) {
        md.push_str(&format!(
            "| {} | {} | {:.2} | {:.6} |\n",
            r.config.label(),
            r.train_size,
            r.aic,
            r.rmse
        ));
    }
    if !report.comparison.failure_counts.is_empty() {
        md.push_str("\nFailures by kind:\n\n");
        for (kind, count) in &report.comparison.failure_counts {
            md.push_str(&format!("- {kind}: {count}\n"));
        }
    }

    let wf = &report.walk_forward;
    md.push_str("\n## Walk-forward\n\n");
    md.push_str(&format!(
        "{} dates forecast, {} failed, {} skipped for short history\n\n",
        wf.records.len() - wf.failed,
        wf.failed,
        wf.skipped
    ));
    md.push_str("| Column | Count | RMSE | MAE | MAPE % |\n|---|---:|---:|---:|---:|\n");
    let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    for m in &report.metrics {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            m.column,
            m.count,
            cell(m.rmse),
            cell(m.mae),
            cell(m.mape)
        ));
    }

    md.push_str("\n## Signals\n\n");
    for (signal, count) in signal_counts(&report.signals) {
        md.push_str(&format!("- {signal}: {count}\n"));
    }

    if !report.future.is_empty() {
        md.push_str("\n## Future forecast\n\n| Date | Price |\n|---|---:|\n");
        for p in &report.future {
            md.push_str(&format!("| {} | {:.2} |\n", p.date, p.predicted_price));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecastlab_core::features::derive;
    use forecastlab_core::model::{ModelConfig, TrainWindow};
    use forecastlab_core::signals::Signal;
    use forecastlab_core::synthetic;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 10, day).unwrap()
    }

    #[test]
    fn ranking_csv_columns() {
        let ranking = [FitResult {
            config: ModelConfig::random_walk().with_window(TrainWindow::Recent(500)),
            aic: -1234.5,
            rmse: 0.0321,
            train_size: 500,
        }];
        let csv = export_ranking_csv(&ranking).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "model_type,train_size,order,aic,rmse");
        assert_eq!(lines.next().unwrap(), "random walk,500,\"(0,1,0)\",-1234.5000,0.032100");
    }

    #[test]
    fn forecast_csv_leaves_invalid_empty() {
        let rows = [ForecastRow {
            date: d(1),
            close: 100.0,
            pred_today: Some(101.0),
            pred_tomorrow: None,
            pred_2_days: None,
        }];
        let csv = export_forecast_csv(&rows).unwrap();
        assert_eq!(csv.lines().nth(1).unwrap(), "2021-10-01,100.000000,101.000000,,");
    }

    #[test]
    fn signals_csv_uses_signal_names() {
        let records = [SignalRecord {
            date: d(2),
            actual_close: 100.0,
            predicted_close: None,
            expected_change_pct: None,
            signal: Signal::NoSignal,
        }];
        let csv = export_signals_csv(&records).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",,,NO_SIGNAL"));
    }

    #[test]
    fn features_parquet_roundtrip() {
        let series = synthetic::random_walk_series("parquet", 230, 100.0, 0.02).unwrap();
        let table = derive(&series);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.parquet");
        write_features_parquet(&table, &path).unwrap();

        let df = ParquetReader::new(fs::File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert_eq!(df.height(), table.len());
        assert_eq!(df.width(), FeatureColumn::all().len() + 1);
        assert!(df.column("sma_200").is_ok());
        assert!(df.column("volume_14").is_ok());
        let closes = df.column("log_close").unwrap().f64().unwrap();
        assert_eq!(closes.get(0), Some(table.rows()[0].log_close));
    }
}
