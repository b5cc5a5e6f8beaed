//! ForecastLab CLI — feature, comparison, forecast and signal commands.
//!
//! Commands:
//! - `features` — derive the feature table, print a summary and importance ranking
//! - `compare` — fit the model grid on the training slice and print the ranking
//! - `forecast` — walk-forward forecast with prediction metrics
//! - `future` — fit on all data and project past the last date
//! - `signals` — walk-forward forecast turned into BUY / SELL / HOLD signals
//! - `run` — every stage, with the full artifact set written to disk
//!
//! Every command reads an optional TOML config; flags override it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use forecastlab_core::domain::{parse_date, PredictionColumn};
use forecastlab_core::features::feature_importance;
use forecastlab_core::model::Order;
use forecastlab_core::signals::{signal_counts, trading_signals};
use forecastlab_runner::export::{
    export_forecast_csv, export_future_csv, export_ranking_csv, export_signals_csv,
    save_artifacts, write_features_parquet,
};
use forecastlab_runner::{
    compare_models, comparison_key, future_forecast, init_logging, load_series, run_from_series,
    walk_forward_forecast, ComparisonCache, FeatureCache, LoadedSeries, LogFormat,
    PredictionMetrics, RunConfig,
};

#[derive(Parser)]
#[command(
    name = "forecastlab",
    about = "ForecastLab CLI — ARIMA-family price forecasting and model comparison"
)]
struct Cli {
    /// Emit logs as JSON lines instead of compact text.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Data selection shared by every command.
#[derive(Args, Debug)]
struct DataArgs {
    /// Path to a TOML run config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV price file (date|timestamp, open, close, volume). Repeat to
    /// concatenate several files.
    #[arg(long)]
    data: Vec<PathBuf>,

    /// Use a synthetic series when no data file is available.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// First date to keep (YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,

    /// Last date to keep (YYYY-MM-DD).
    #[arg(long)]
    to: Option<String>,
}

/// Walk-forward settings shared by `forecast` and `signals`.
#[derive(Args, Debug)]
struct ForecastArgs {
    /// First walk-forward date (YYYY-MM-DD).
    #[arg(long)]
    start_date: Option<String>,

    /// Days after the start date to keep forecasting.
    #[arg(long)]
    horizon: Option<u32>,

    /// ARIMA order as "p,d,q".
    #[arg(long)]
    order: Option<String>,

    /// Run dates one at a time instead of on the thread pool.
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive features and print a summary.
    Features {
        #[command(flatten)]
        data: DataArgs,

        /// Number of importance rows to print.
        #[arg(long, default_value_t = 15)]
        top: usize,

        /// Write the feature table to this Parquet file.
        #[arg(long)]
        parquet: Option<PathBuf>,
    },
    /// Fit the model grid on the training slice and rank it.
    Compare {
        #[command(flatten)]
        data: DataArgs,

        /// Last training date (YYYY-MM-DD).
        #[arg(long)]
        train_end: Option<String>,

        /// Skip the exogenous-regressor family.
        #[arg(long, default_value_t = false)]
        no_arimax: bool,

        /// Fit configurations one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Per-fit wall-clock budget in seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Reuse comparison results stored in this directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Write the ranking as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Walk-forward forecast with prediction metrics.
    Forecast {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forecast: ForecastArgs,

        /// Write the merged actual-vs-predicted table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Fit on all data and project beyond the last date.
    Future {
        #[command(flatten)]
        data: DataArgs,

        /// Days to project.
        #[arg(long)]
        days: Option<usize>,

        /// ARIMA order as "p,d,q".
        #[arg(long)]
        order: Option<String>,

        /// Write the projection as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Turn a walk-forward forecast into trading signals.
    Signals {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        forecast: ForecastArgs,

        /// Prediction column: pred_today, pred_tomorrow or pred_2_days.
        #[arg(long)]
        column: Option<String>,

        /// BUY when the expected change exceeds this percentage.
        #[arg(long)]
        buy_above: Option<f64>,

        /// SELL when the expected change is below this percentage.
        #[arg(long, allow_hyphen_values = true)]
        sell_below: Option<f64>,

        /// Write the signal table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Run every stage and save the artifact set.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    match cli.command {
        Commands::Features { data, top, parquet } => run_features(data, top, parquet),
        Commands::Compare {
            data,
            train_end,
            no_arimax,
            sequential,
            timeout,
            cache_dir,
            csv,
        } => run_compare(data, train_end, no_arimax, sequential, timeout, cache_dir, csv),
        Commands::Forecast { data, forecast, csv } => run_forecast(data, forecast, csv),
        Commands::Future {
            data,
            days,
            order,
            csv,
        } => run_future(data, days, order, csv),
        Commands::Signals {
            data,
            forecast,
            column,
            buy_above,
            sell_below,
            csv,
        } => run_signals(data, forecast, column, buy_above, sell_below, csv),
        Commands::Run { data, output_dir } => run_all(data, output_dir),
    }
}

// ─── Config assembly ─────────────────────────────────────────────────

fn parse_opt_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(parse_date)
        .transpose()
        .context("invalid date argument")
}

fn base_config(args: &DataArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    if let Some((first, rest)) = args.data.split_first() {
        config.data.path = Some(first.clone());
        config.data.paths = rest.to_vec();
    }
    config.data.synthetic |= args.synthetic;
    if let Some(start) = parse_opt_date(args.from.as_deref())? {
        config.data.start = Some(start);
    }
    if let Some(end) = parse_opt_date(args.to.as_deref())? {
        config.data.end = Some(end);
    }
    Ok(config)
}

fn apply_forecast_args(config: &mut RunConfig, args: &ForecastArgs) -> Result<()> {
    if let Some(start) = parse_opt_date(args.start_date.as_deref())? {
        config.forecast.start_date = start;
    }
    if let Some(horizon) = args.horizon {
        config.forecast.horizon_days = horizon;
    }
    if let Some(order) = &args.order {
        config.forecast.order = Order::parse(order)?;
    }
    if args.sequential {
        config.forecast.parallel = false;
    }
    Ok(())
}

fn load(config: &RunConfig) -> Result<LoadedSeries> {
    config.validate()?;
    Ok(load_series(&config.data)?)
}

fn write_output(path: &Option<PathBuf>, content: String) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

// ─── Commands ────────────────────────────────────────────────────────

fn run_features(args: DataArgs, top: usize, parquet: Option<PathBuf>) -> Result<()> {
    let config = base_config(&args)?;
    let loaded = load(&config)?;
    let table = FeatureCache::new().get_or_derive(&loaded.series);
    let summary = loaded.series.summary();

    println!("Source:        {}", loaded.source);
    println!("Records:       {} ({} to {})", summary.total_records, summary.start, summary.end);
    println!("Close:         min {:.2}  max {:.2}  mean {:.2}  std {:.2}",
        summary.close_min, summary.close_max, summary.close_mean, summary.close_std);
    match (table.first_date(), table.last_date()) {
        (Some(first), Some(last)) => {
            println!("Feature rows:  {} ({first} to {last})", table.len())
        }
        _ => println!("Feature rows:  0 (series too short)"),
    }

    println!("\nTop features by |correlation| with log_close:");
    for f in feature_importance(&table).into_iter().take(top) {
        println!("  {:<16} {:.4}", f.column.name(), f.abs_correlation);
    }

    if let Some(path) = parquet {
        write_features_parquet(&table, &path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_compare(
    args: DataArgs,
    train_end: Option<String>,
    no_arimax: bool,
    sequential: bool,
    timeout: Option<f64>,
    cache_dir: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let mut config = base_config(&args)?;
    if let Some(end) = parse_opt_date(train_end.as_deref())? {
        config.compare.train_end = end;
    }
    if no_arimax {
        config.compare.grid.include_arimax = false;
    }
    if sequential {
        config.compare.options.parallel = false;
    }
    if timeout.is_some() {
        config.compare.options.fit_timeout_secs = timeout;
    }

    let loaded = load(&config)?;
    let training = FeatureCache::new()
        .get_or_derive(&loaded.series)
        .until(config.compare.train_end);
    println!("Training rows: {} (through {})", training.len(), config.compare.train_end);

    let cache = cache_dir.map(ComparisonCache::new).transpose()?;
    let key = comparison_key(&loaded.series, &config.compare)?;
    let cached = match &cache {
        Some(c) => c.get(&key)?,
        None => None,
    };
    let comparison = match cached {
        Some(hit) => {
            info!(key = %key, "comparison cache hit");
            hit
        }
        None => {
            let fresh = compare_models(&training, &config.compare.grid, &config.compare.options)?;
            if let Some(c) = &cache {
                c.put(&key, &fresh)?;
            }
            fresh
        }
    };

    println!(
        "\n{:<26} {:>10} {:>12} {:>10}",
        "Model", "Train size", "AIC", "RMSE"
    );
    for r in &comparison.ranking {
        println!(
            "{:<26} {:>10} {:>12.2} {:>10.6}",
            r.config.label(),
            r.train_size,
            r.aic,
            r.rmse
        );
    }
    println!(
        "\n{} attempted, {} ranked, {} failed",
        comparison.attempted,
        comparison.ranking.len(),
        comparison.failed()
    );
    for (kind, count) in &comparison.failure_counts {
        println!("  {kind}: {count}");
    }

    write_output(&csv, export_ranking_csv(&comparison.ranking)?)
}

fn run_forecast(args: DataArgs, forecast: ForecastArgs, csv: Option<PathBuf>) -> Result<()> {
    let mut config = base_config(&args)?;
    apply_forecast_args(&mut config, &forecast)?;
    let loaded = load(&config)?;
    let table = FeatureCache::new().get_or_derive(&loaded.series);

    let wf = walk_forward_forecast(&table, &config.forecast)?;
    println!(
        "Walk-forward {} from {} (+{} days): {} forecast, {} failed, {} skipped",
        config.forecast.order,
        config.forecast.start_date,
        config.forecast.horizon_days,
        wf.succeeded(),
        wf.failed,
        wf.skipped
    );

    println!("\n{:<12} {:>12} {:>12} {:>12} {:>12}", "Date", "Close", "Today", "Tomorrow", "2 days");
    for row in wf.rows.iter().filter(|r| r.pred_today.is_some() || r.pred_tomorrow.is_some()) {
        println!(
            "{:<12} {:>12.2} {:>12} {:>12} {:>12}",
            row.date,
            row.close,
            fmt_opt(row.pred_today, 2),
            fmt_opt(row.pred_tomorrow, 2),
            fmt_opt(row.pred_2_days, 2)
        );
    }

    println!("\n{:<14} {:>6} {:>12} {:>12} {:>8}", "Column", "Count", "RMSE", "MAE", "MAPE %");
    for column in PredictionColumn::ALL {
        let m = PredictionMetrics::compute(&wf.rows, column);
        println!(
            "{:<14} {:>6} {:>12} {:>12} {:>8}",
            column.name(),
            m.count,
            fmt_opt(m.rmse, 4),
            fmt_opt(m.mae, 4),
            fmt_opt(m.mape, 3)
        );
    }

    write_output(&csv, export_forecast_csv(&wf.rows)?)
}

fn run_future(
    args: DataArgs,
    days: Option<usize>,
    order: Option<String>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let mut config = base_config(&args)?;
    if let Some(days) = days {
        config.future.days_ahead = days;
    }
    if let Some(order) = order {
        config.future.order = Order::parse(&order)?;
    }
    let loaded = load(&config)?;
    let table = FeatureCache::new().get_or_derive(&loaded.series);

    let points = future_forecast(&table, &config.future)?;
    println!("{:<12} {:>14} {:>14}", "Date", "Price", "Log price");
    for p in &points {
        println!("{:<12} {:>14.2} {:>14.6}", p.date, p.predicted_price, p.log_predicted_price);
    }
    write_output(&csv, export_future_csv(&points)?)
}

fn run_signals(
    args: DataArgs,
    forecast: ForecastArgs,
    column: Option<String>,
    buy_above: Option<f64>,
    sell_below: Option<f64>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let mut config = base_config(&args)?;
    apply_forecast_args(&mut config, &forecast)?;
    if let Some(column) = column {
        config.signals.column = column
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(v) = buy_above {
        config.signals.thresholds.buy_above = v;
    }
    if let Some(v) = sell_below {
        config.signals.thresholds.sell_below = v;
    }
    let loaded = load(&config)?;
    let table = FeatureCache::new().get_or_derive(&loaded.series);

    let wf = walk_forward_forecast(&table, &config.forecast)?;
    let signals = trading_signals(&wf.rows, config.signals.column, &config.signals.thresholds);

    println!(
        "{:<12} {:>12} {:>12} {:>10} {:>10}",
        "Date", "Close", "Predicted", "Change %", "Signal"
    );
    for s in signals.iter().filter(|s| s.predicted_close.is_some()) {
        println!(
            "{:<12} {:>12.2} {:>12} {:>10} {:>10}",
            s.date,
            s.actual_close,
            fmt_opt(s.predicted_close, 2),
            fmt_opt(s.expected_change_pct, 3),
            s.signal
        );
    }
    println!();
    for (signal, count) in signal_counts(&signals) {
        println!("  {signal}: {count}");
    }

    write_output(&csv, export_signals_csv(&signals)?)
}

fn run_all(args: DataArgs, output_dir: PathBuf) -> Result<()> {
    let config = base_config(&args)?;
    let loaded = load(&config)?;
    let cache = FeatureCache::new();
    let (report, table) = run_from_series(&loaded, &config, &cache)?;

    if let Some(best) = report.comparison.best() {
        println!("Best model:    {} (RMSE {:.6})", best.config.label(), best.rmse);
    }
    println!(
        "Walk-forward:  {} forecast, {} failed, {} skipped",
        report.walk_forward.succeeded(),
        report.walk_forward.failed,
        report.walk_forward.skipped
    );
    for m in &report.metrics {
        println!("  {:<14} RMSE {}  MAPE {}", m.column.name(), fmt_opt(m.rmse, 4), fmt_opt(m.mape, 3));
    }

    let run_dir = save_artifacts(&report, &table, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}
