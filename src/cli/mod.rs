//! autoreg CLI
//!
//! Command-line interface for training, prediction and dataset inspection.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AutoRegressionConfig;
use crate::ingestion::{write_csv, DataIngestion, FileType, IngestionArtifact};
use crate::params::{parse_key_value, Params};
use crate::pipeline::{AutoRegression, FittedPipeline};
use crate::training::ModelReport;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "autoreg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated regression: load a dataset, try several regressors, keep the best")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train candidate regressors and report the best one
    Train {
        /// Input data file (CSV, TSV, Parquet, JSON or NDJSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// File type; defaults to the file extension
        #[arg(long)]
        filetype: Option<String>,

        /// Ingestion parameter as key=value (repeatable), e.g. -p sep=;
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// JSON file with transformation and trainer settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Save the fitted pipeline as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict with a saved pipeline
    Predict {
        /// Saved pipeline file
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// File type; defaults to the file extension
        #[arg(long)]
        filetype: Option<String>,

        /// Ingestion parameter as key=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Write the input plus a prediction column as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// File type; defaults to the file extension
        #[arg(long)]
        filetype: Option<String>,
    },
}

// ─── Argument helpers ──────────────────────────────────────────────────────────

fn resolve_filetype(path: &Path, explicit: Option<&str>) -> anyhow::Result<String> {
    match explicit {
        Some(ft) => Ok(ft.to_string()),
        None => Ok(FileType::from_path(path)?.as_str().to_string()),
    }
}

pub fn parse_params(raw: &[String]) -> anyhow::Result<Params> {
    let mut params = Params::new();
    for pair in raw {
        let (key, value) = parse_key_value(pair)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn ingest(path: &Path, filetype: Option<&str>, params: &Params) -> anyhow::Result<IngestionArtifact> {
    let filetype = resolve_filetype(path, filetype)?;
    Ok(DataIngestion::new(path, &filetype, params)?.run_data_ingestion()?)
}

fn print_report(reports: &[ModelReport], best: &str) {
    println!();
    println!(
        "  {:<28} {:>9} {:>9} {:>10} {:>8}",
        muted("Model"),
        muted("CV R²"),
        muted("Test R²"),
        muted("RMSE"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(68)));

    for report in reports {
        let name = if report.model_name == best {
            report.model_name.white().bold()
        } else {
            report.model_name.normal()
        };
        match (&report.test_metrics, &report.error) {
            (Some(m), _) => println!(
                "  {:<28} {:>9} {:>9.4} {:>10.4} {:>7.2}s",
                name,
                report.cv_score.map(|s| format!("{:.4}", s)).unwrap_or_else(|| "-".to_string()),
                m.r2_score,
                m.rmse,
                report.training_time_secs
            ),
            (None, Some(e)) => println!("  {:<28} {}", name, format!("err: {}", e).red()),
            (None, None) => println!("  {:<28} {}", name, dim("skipped")),
        }
    }

    println!("  {}", dim(&"─".repeat(68)));
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    filetype: Option<&str>,
    raw_params: &[String],
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let filetype = resolve_filetype(data_path, filetype)?;
    let params = parse_params(raw_params)?;
    let config = match config_path {
        Some(path) => AutoRegressionConfig::from_json_file(path)?,
        None => AutoRegressionConfig::default(),
    };

    step_run(&format!("Training on {}", data_path.display().to_string().cyan()));
    let start = Instant::now();
    let auto = AutoRegression::new(data_path.to_string_lossy(), filetype, target, params).with_config(config);
    let run = auto.run()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let summary = &run.ingestion.summary;
    println!(
        "  {} {} rows × {} cols, {} features",
        ok("✓"),
        summary.n_rows,
        summary.n_cols,
        run.transformation.n_features()
    );

    print_report(&run.trainer.models_report, &run.trainer.best_model_name);

    let result = run.result();
    println!();
    println!("  {} {}", ok("best"), result.best_model_name.white().bold());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", result.r2_score).white().bold());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", result.rmse).white());
    println!("  {:<16} {}", muted("MSE"), format!("{:.4}", result.mse).white());
    if !result.model_params.is_empty() {
        let params: Vec<String> = result.model_params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("  {:<16} {}", muted("Params"), params.join(", ").white());
    }

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        run.export().save(path)?;
        step_done("");
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    filetype: Option<&str>,
    raw_params: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let pipeline = FittedPipeline::load(model_path)?;
    step_done(&pipeline.best_model_name);

    let params = parse_params(raw_params)?;
    step_run("Loading data");
    let artifact = ingest(data_path, filetype, &params)?;
    step_done(&format!("{} rows", artifact.dataframe.height()));

    step_run("Predicting");
    let start = Instant::now();
    let predictions = pipeline.predict(&artifact.dataframe)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    match output {
        Some(path) => {
            let mut df = artifact.dataframe;
            df.with_column(Series::new("prediction".into(), predictions.to_vec()))?;
            write_csv(&mut df, path)?;
            println!("  {} wrote {}", ok("✓"), path.display());
        }
        None => {
            println!();
            println!("  {:<8} {}", muted("Row"), muted(&format!("{} (predicted)", pipeline.target_column)));
            for (i, p) in predictions.iter().take(20).enumerate() {
                println!("  {:<8} {:.4}", i, p);
            }
            if predictions.len() > 20 {
                println!("  {}", dim(&format!("... {} more", predictions.len() - 20)));
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path, filetype: Option<&str>) -> anyhow::Result<()> {
    section("Data Info");

    let artifact = ingest(data_path, filetype, &Params::new())?;
    let summary = &artifact.summary;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Format"), artifact.file_type);
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_cols);
    println!(
        "  {:<12} {:.2} MB",
        muted("Memory"),
        artifact.dataframe.estimated_size() as f64 / 1024.0 / 1024.0
    );
    println!();

    println!("  {:<24} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(44)));

    for col in &summary.columns {
        println!(
            "  {:<24} {:<12} {:>6}",
            col.name,
            col.dtype.truecolor(140, 140, 140),
            col.null_count
        );
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn test_parse_params() {
        let raw = vec!["sep=;".to_string(), "n_rows=10".to_string(), "has_header=false".to_string()];
        let params = parse_params(&raw).unwrap();
        assert_eq!(params["sep"], ParamValue::String(";".to_string()));
        assert_eq!(params["n_rows"], ParamValue::Int(10));
        assert_eq!(params["has_header"], ParamValue::Bool(false));

        assert!(parse_params(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_resolve_filetype() {
        assert_eq!(resolve_filetype(Path::new("a/b.parquet"), None).unwrap(), "parquet");
        assert_eq!(resolve_filetype(Path::new("a/b.txt"), Some("csv")).unwrap(), "csv");
        assert!(resolve_filetype(Path::new("a/b"), None).is_err());
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "autoreg", "train", "-d", "data.csv", "-t", "price", "-p", "sep=;", "-p", "n_rows=5",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { target, params, filetype, .. } => {
                assert_eq!(target, "price");
                assert_eq!(params, vec!["sep=;", "n_rows=5"]);
                assert_eq!(filetype, None);
            }
            _ => panic!("expected train"),
        }
    }
}
