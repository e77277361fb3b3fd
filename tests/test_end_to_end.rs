//! Integration tests: real files through ingestion, transformation and training

use autoreg::prelude::*;
use polars::prelude::*;
use std::fmt::Write as _;
use std::path::Path;

/// y = 3·x1 − 2·x2 + 5, plus 10 for city "b"
fn linear_rows(n: usize) -> Vec<(f64, f64, &'static str, f64)> {
    (0..n)
        .map(|i| {
            let x1 = i as f64;
            let x2 = ((i * 7) % 11) as f64;
            let city = if i % 3 == 0 { "b" } else { "a" };
            let bump = if city == "b" { 10.0 } else { 0.0 };
            (x1, x2, city, 3.0 * x1 - 2.0 * x2 + 5.0 + bump)
        })
        .collect()
}

fn write_delimited(path: &Path, sep: char, n: usize) {
    let mut out = String::new();
    writeln!(out, "x1{sep}x2{sep}city{sep}y").unwrap();
    for (x1, x2, city, y) in linear_rows(n) {
        writeln!(out, "{x1}{sep}{x2}{sep}{city}{sep}{y}").unwrap();
    }
    std::fs::write(path, out).unwrap();
}

fn run_fast(path: &Path, filetype: &str, target: &str, params: Params) -> autoreg::Result<RegressionResult> {
    AutoRegression::new(path.to_string_lossy(), filetype, target, params)
        .with_config(fast_config())
        .train_model()
}

fn fast_config() -> AutoRegressionConfig {
    AutoRegressionConfig::default().with_trainer(TrainerConfig::default().with_candidates(vec![
        ModelType::LinearRegression,
        ModelType::Ridge,
        ModelType::DecisionTreeRegressor,
        ModelType::KNeighborsRegressor,
    ]))
}

fn params(entries: &[(&str, ParamValue)]) -> Params {
    entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn test_linear_csv_selects_near_perfect_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_delimited(&path, ',', 60);

    let result = AutoRegression::new(path.to_string_lossy(), "csv", "y", Params::new())
        .train_model()
        .unwrap();

    assert!(result.r2_score > 0.99, "r2 was {}", result.r2_score);
    assert!(result.rmse >= 0.0);
    assert!((result.mse - result.rmse * result.rmse).abs() < 1e-9);
    assert_eq!(result.model.name(), result.best_model_name);
}

#[test]
fn test_report_covers_every_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_delimited(&path, ',', 40);

    let run = AutoRegression::new(path.to_string_lossy(), "csv", "y", Params::new())
        .with_config(fast_config())
        .run()
        .unwrap();

    let names: Vec<&str> = run.trainer.models_report.iter().map(|r| r.model_name.as_str()).collect();
    assert_eq!(names, vec!["LinearRegression", "Ridge", "DecisionTreeRegressor", "KNeighborsRegressor"]);
    assert_eq!(run.transformation.feature_names, vec!["x1", "x2", "city_a", "city_b"]);
    assert_eq!(run.transformation.x_test.nrows(), 8);
}

#[test]
fn test_semicolon_separated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_delimited(&path, ';', 40);

    let with_sep = AutoRegression::new(path.to_string_lossy(), "csv", "y", params(&[("sep", ";".into())]))
        .with_config(fast_config())
        .train_model()
        .unwrap();
    assert!(with_sep.r2_score > 0.99);

    // read with the default comma the whole header is one column
    let without_sep = AutoRegression::new(path.to_string_lossy(), "csv", "y", Params::new())
        .with_config(fast_config())
        .train_model();
    assert!(matches!(without_sep, Err(AutoRegError::TargetNotFound(_))));
}

#[test]
fn test_unknown_param_fails_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_delimited(&path, ',', 20);

    let err = AutoRegression::new(path.to_string_lossy(), "csv", "y", params(&[("bogus", 1.into())]))
        .train_model()
        .unwrap_err();
    match err {
        AutoRegError::InvalidParameter { name, .. } => assert_eq!(name, "bogus"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_target_fails_transformation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    write_delimited(&path, ',', 20);

    let err = AutoRegression::new(path.to_string_lossy(), "csv", "price", Params::new())
        .with_config(fast_config())
        .train_model()
        .unwrap_err();
    assert!(matches!(err, AutoRegError::TargetNotFound(ref t) if t == "price"));
}

#[test]
fn test_missing_file_and_bad_format() {
    let err = AutoRegression::new("/definitely/not/here.csv", "csv", "y", Params::new())
        .train_model()
        .unwrap_err();
    assert!(matches!(err, AutoRegError::DataError(_)));

    let err = AutoRegression::new("data.xlsx", "xlsx", "y", Params::new())
        .train_model()
        .unwrap_err();
    assert!(matches!(err, AutoRegError::UnsupportedFormat(_)));
}

#[test]
fn test_ndjson_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.jsonl");
    let mut out = String::new();
    for (x1, x2, city, y) in linear_rows(30) {
        writeln!(out, r#"{{"x1": {x1:.1}, "x2": {x2:.1}, "city": "{city}", "y": {y:.1}}}"#).unwrap();
    }
    std::fs::write(&path, out).unwrap();

    let result = AutoRegression::new(path.to_string_lossy(), "jsonl", "y", Params::new())
        .with_config(fast_config())
        .train_model()
        .unwrap();
    assert!(result.r2_score > 0.99);
}

#[test]
fn test_exported_pipeline_predicts_like_run() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("linear.csv");
    let model_path = dir.path().join("model.json");
    write_delimited(&data, ',', 40);

    let run = AutoRegression::new(data.to_string_lossy(), "csv", "y", Params::new())
        .with_config(fast_config())
        .run()
        .unwrap();
    run.export().save(&model_path).unwrap();

    let loaded = FittedPipeline::load(&model_path).unwrap();
    assert_eq!(loaded.target_column, "y");
    assert_eq!(loaded.feature_columns, vec!["x1", "x2", "city"]);

    let df = &run.ingestion.dataframe;
    let expected = run.predict(df).unwrap();
    let actual = loaded.predict(df).unwrap();
    assert_eq!(expected.len(), 40);
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert!((e - a).abs() < 1e-9);
    }
}

#[test]
fn test_parquet_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.parquet");

    let rows = linear_rows(40);
    let mut df = df!(
        "x1" => rows.iter().map(|r| r.0).collect::<Vec<f64>>(),
        "x2" => rows.iter().map(|r| r.1).collect::<Vec<f64>>(),
        "city" => rows.iter().map(|r| r.2).collect::<Vec<&str>>(),
        "y" => rows.iter().map(|r| r.3).collect::<Vec<f64>>()
    )
    .unwrap();
    let file = std::fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let result = run_fast(&path, "parquet", "y", Params::new()).unwrap();
    assert!(result.r2_score > 0.99, "r2 was {}", result.r2_score);
}

#[test]
fn test_json_array_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.json");
    let records: Vec<String> = linear_rows(40)
        .into_iter()
        .map(|(x1, x2, city, y)| format!(r#"{{"x1": {x1:.1}, "x2": {x2:.1}, "city": "{city}", "y": {y:.1}}}"#))
        .collect();
    std::fs::write(&path, format!("[{}]", records.join(",\n"))).unwrap();

    let result = run_fast(&path, "json", "y", Params::new()).unwrap();
    assert!(result.r2_score > 0.99, "r2 was {}", result.r2_score);
}

#[test]
fn test_tsv_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.tsv");
    write_delimited(&path, '\t', 40);

    let result = run_fast(&path, "tsv", "y", Params::new()).unwrap();
    assert!(result.r2_score > 0.99, "r2 was {}", result.r2_score);
}

#[test]
fn test_headerless_csv_uses_generated_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noheader.csv");
    let mut out = String::new();
    for (x1, x2, _, _) in linear_rows(40) {
        writeln!(out, "{x1:.1},{x2:.1},{:.1}", 3.0 * x1 - 2.0 * x2 + 5.0).unwrap();
    }
    std::fs::write(&path, out).unwrap();

    let run = AutoRegression::new(
        path.to_string_lossy(),
        "csv",
        "column_3",
        params(&[("has_header", false.into())]),
    )
    .with_config(fast_config())
    .run()
    .unwrap();

    assert_eq!(run.ingestion.summary.n_rows, 40);
    assert_eq!(run.transformation.feature_names, vec!["column_1", "column_2"]);
    assert!(run.result().r2_score > 0.99);
}

#[test]
fn test_skip_rows_before_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("preamble.csv");
    write_delimited(&path, ',', 40);
    let body = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, format!("exported by sensor hub\nrevision 2\n{body}")).unwrap();

    let result = run_fast(&path, "csv", "y", params(&[("skip_rows", 2.into())])).unwrap();
    assert!(result.r2_score > 0.99, "r2 was {}", result.r2_score);
}

#[test]
fn test_infinite_feature_cell_is_imputed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("with_inf.csv");
    let mut out = String::from("x1,x2,city,y\n");
    for (i, (x1, x2, city, y)) in linear_rows(60).into_iter().enumerate() {
        let x1 = if i == 17 { "inf".to_string() } else { format!("{x1:.1}") };
        writeln!(out, "{x1},{x2:.1},{city},{y:.1}").unwrap();
    }
    std::fs::write(&path, out).unwrap();

    let run = AutoRegression::new(path.to_string_lossy(), "csv", "y", Params::new())
        .with_config(fast_config())
        .run()
        .unwrap();

    assert!(run.transformation.x_train.iter().all(|v| v.is_finite()));
    assert!(run.transformation.x_test.iter().all(|v| v.is_finite()));
    assert!(run.trainer.models_report.iter().all(|r| r.succeeded()));
    assert!(run.result().r2_score > 0.8, "r2 was {}", run.result().r2_score);
}
