use std::path::Path;

use tempfile::tempdir;

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::minute::step_2_model_selection::ForecastStrategy;
use crate::minute::step_5_pipeline::{run_forecast, run_forecast_from_csv, ForecastRequest};
use crate::util::file_utils::{data_file_path, save_records_csv};
use crate::util::model_utils::load_trained_model;
use crate::util::pre_processor::{records_to_dataframe, TimeSeriesRecord};

fn synthetic_records(n: usize) -> Vec<TimeSeriesRecord> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 2000.0 + (t * 0.3).sin() * 15.0 + t * 0.4;
            TimeSeriesRecord {
                time: 1_700_000_000 + 600 * i as i64,
                open: close - 1.0,
                high: close + 2.0 + (i % 4) as f64 * 0.5,
                low: close - 2.0 - (i % 3) as f64 * 0.5,
                close,
                volumefrom: 500.0 + ((i * 17) % 53) as f64,
                volumeto: 1_000_000.0 + ((i * 29) % 211) as f64 * 100.0,
            }
        })
        .collect()
}

fn config_in(root: &Path) -> ForecastConfig {
    ForecastConfig {
        data_dir: root.join("data"),
        model_dir: root.join("models"),
        experiment_dir: root.join("experiments"),
        ..ForecastConfig::default()
    }
}

fn store_series(config: &ForecastConfig, n: usize) {
    let path = data_file_path(&config.data_dir, "ETH", "USD");
    std::fs::create_dir_all(&config.data_dir).unwrap();
    save_records_csv(&synthetic_records(n), &path).unwrap();
}

#[test]
fn test_csv_forecast_writes_predictions_model_and_experiment() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    store_series(&config, 80);

    for strategy in [ForecastStrategy::Linear, ForecastStrategy::XGBoost] {
        let request = ForecastRequest::from_config(strategy, "eth", "usd", &config);
        let report = run_forecast_from_csv(&config, &request).unwrap();

        let predictions_file = report.predictions_file.clone().unwrap();
        assert!(predictions_file.ends_with(format!("{}_predictions.csv", strategy.name())));
        let written = std::fs::read_to_string(&predictions_file).unwrap();
        assert!(written.starts_with("time,actual,predicted"));
        assert_eq!(written.lines().count(), report.test_rows + 1);

        let model_file = report.model_file.clone().unwrap();
        assert!(model_file.exists());

        let (artifact, metadata) = load_trained_model(&config.model_dir, "ETH", strategy).unwrap();
        assert_eq!(artifact.strategy(), strategy);
        assert_eq!(artifact.feature_names, report.feature_names);
        assert_eq!(metadata.params, report.params);
        assert_eq!(metadata.symbol, "ETH");
    }

    let experiments: Vec<_> = std::fs::read_dir(&config.experiment_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(experiments.len(), 2);
}

#[test]
fn test_missing_csv_is_not_found() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let request = ForecastRequest::new(ForecastStrategy::Linear, "BTC", "USD");
    assert!(matches!(
        run_forecast_from_csv(&config, &request),
        Err(ForecastError::NotFound(_))
    ));
}

#[test]
fn test_selection_is_repeatable() {
    let df = records_to_dataframe(&synthetic_records(60)).unwrap();
    let request = ForecastRequest::new(ForecastStrategy::XGBoost, "ETH", "USD");

    let first = run_forecast(&df, &request).unwrap().report;
    let second = run_forecast(&df, &request).unwrap().report;
    assert_eq!(first.params, second.params);
    assert_eq!(first.selection_score.to_bits(), second.selection_score.to_bits());
    assert_eq!(first.predictions, second.predictions);
}

#[test]
fn test_lag_rows_and_alignment() {
    // 10 rows with 3 lags leave 7 usable rows: 5 train, 2 test
    let records = synthetic_records(10);
    let df = records_to_dataframe(&records).unwrap();
    let request = ForecastRequest::new(ForecastStrategy::Linear, "ETH", "USD");
    let report = run_forecast(&df, &request).unwrap().report;

    assert_eq!(report.train_rows, 5);
    assert_eq!(report.test_rows, 2);
    assert_eq!(report.predictions[0].time, records[8].time);
    assert_eq!(report.predictions[1].actual, records[9].close);
    assert!(!report.degenerate_split);
}

#[test]
fn test_single_usable_row_trains_and_tests_on_it() {
    // 4 rows with 3 lags leave exactly one usable row
    let records = synthetic_records(4);
    let df = records_to_dataframe(&records).unwrap();
    let request = ForecastRequest::new(ForecastStrategy::XGBoost, "ETH", "USD");
    let report = run_forecast(&df, &request).unwrap().report;

    assert!(report.degenerate_split);
    assert_eq!(report.train_rows, 1);
    assert_eq!(report.test_rows, 1);
    assert_eq!(report.predictions[0].time, records[3].time);
}
