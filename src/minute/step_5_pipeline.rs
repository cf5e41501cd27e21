// External imports
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

// Internal imports
use super::step_1_data_preparation::prepare_training_data;
use super::step_2_model_selection::{select_model, ForecastStrategy};
use super::step_3_evaluation::{ForecastEvaluation, PredictionRow};
use super::step_4_model_serialization::{save_artifact, ArtifactMetadata, ModelArtifact};
use crate::config::ForecastConfig;
use crate::constants::{DEFAULT_CURRENCY, DEFAULT_LAG_COUNT, DEFAULT_SYMBOL, TRAIN_RATIO};
use crate::error::Result;
use crate::util::file_utils::{data_file_path, write_csv_file};
use crate::util::metrics::ForecastMetrics;
use crate::util::model_logger::ForecastExperiment;
use crate::util::model_utils::get_model_file;
use crate::util::pre_processor::load_and_preprocess;

/// Parameters of one batch forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub strategy: ForecastStrategy,
    pub symbol: String,
    pub currency: String,
    pub lag_count: usize,
    pub train_ratio: f64,
}

impl ForecastRequest {
    pub fn new(strategy: ForecastStrategy, symbol: &str, currency: &str) -> Self {
        Self {
            strategy,
            symbol: symbol.to_uppercase(),
            currency: currency.to_uppercase(),
            lag_count: DEFAULT_LAG_COUNT,
            train_ratio: TRAIN_RATIO,
        }
    }

    /// Defaults overridden by the runtime configuration
    pub fn from_config(strategy: ForecastStrategy, symbol: &str, currency: &str, config: &ForecastConfig) -> Self {
        Self {
            lag_count: config.lag_count,
            train_ratio: config.train_ratio,
            ..Self::new(strategy, symbol, currency)
        }
    }
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self::new(ForecastStrategy::Arimax, DEFAULT_SYMBOL, DEFAULT_CURRENCY)
    }
}

/// Outcome of a batch forecast, returned to HTTP and CLI callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub strategy: ForecastStrategy,
    pub symbol: String,
    pub currency: String,
    pub params: String,
    pub selection_score: f64,
    pub candidates: usize,
    pub failed_candidates: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Training and test partitions are the same single row
    pub degenerate_split: bool,
    pub feature_names: Vec<String>,
    pub metrics: ForecastMetrics,
    pub predictions: Vec<PredictionRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictions_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<PathBuf>,
}

/// Report plus the artifact ready for persistence
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub report: ForecastReport,
    pub evaluation: ForecastEvaluation,
    pub artifact: ModelArtifact,
}

/// Features, split, grid search and evaluation over a preprocessed frame
pub fn run_forecast(df: &DataFrame, request: &ForecastRequest) -> Result<ForecastOutput> {
    let feature_set = request.strategy.feature_set(request.lag_count);
    let split = prepare_training_data(df, &feature_set, request.train_ratio)?;

    let selection = select_model(request.strategy, &split.train)?;
    let predictions = selection.model.predict(&split.test)?;
    let evaluation = ForecastEvaluation::new(&split.test, &predictions)?;

    let artifact = ModelArtifact::new(
        selection.model,
        split.train.feature_names.clone(),
        feature_set.lag_count(),
    );

    let report = ForecastReport {
        strategy: request.strategy,
        symbol: request.symbol.clone(),
        currency: request.currency.clone(),
        params: selection.params,
        selection_score: selection.score,
        candidates: selection.attempted,
        failed_candidates: selection.failures,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        degenerate_split: split.degenerate,
        feature_names: artifact.feature_names.clone(),
        metrics: evaluation.metrics,
        predictions: evaluation.rows.clone(),
        predictions_file: None,
        model_file: None,
    };

    Ok(ForecastOutput {
        report,
        evaluation,
        artifact,
    })
}

/// Batch forecast over the stored CSV for the request's pair.
///
/// Writes `{strategy}_predictions.csv` to the data directory, saves the
/// artifact under the model directory and records an experiment log entry.
pub fn run_forecast_from_csv(config: &ForecastConfig, request: &ForecastRequest) -> Result<ForecastReport> {
    let csv_path = data_file_path(&config.data_dir, &request.symbol, &request.currency);
    log::info!(
        "Using {} for predictions with model: {}",
        csv_path.display(),
        request.strategy
    );
    let df = load_and_preprocess(&csv_path)?;

    let start_time = Instant::now();
    let output = run_forecast(&df, request)?;
    let elapsed = start_time.elapsed().as_secs_f64();
    let mut report = output.report;

    let mut results = output.evaluation.to_dataframe()?;
    let predictions_path = config
        .data_dir
        .join(format!("{}_predictions.csv", request.strategy.name()));
    report.predictions_file = Some(write_csv_file(&mut results, &predictions_path)?);

    let metadata = ArtifactMetadata::new(&output.artifact, &request.symbol, &request.currency, &report.params);
    let model_base = get_model_file(&config.model_dir, &request.symbol, request.strategy);
    report.model_file = Some(save_artifact(&output.artifact, &metadata, &model_base)?);

    let mut experiment = ForecastExperiment::new(&request.symbol, &request.currency, request.strategy.name());
    experiment.set_selection(&report.params, report.candidates, report.failed_candidates);
    experiment.set_rows(report.train_rows, report.test_rows);
    experiment.set_metrics(report.metrics);
    experiment.set_training_time(elapsed);
    if report.degenerate_split {
        experiment.add_note("single-row series trained and tested on the same data");
    }
    match experiment.save(&config.experiment_dir) {
        Ok(path) => log::info!("Experiment logged to {}", path.display()),
        Err(e) => log::warn!("Failed to log experiment: {}", e),
    }

    log::info!(
        "{} forecast for {}/{} finished in {:.2}s: {} RMSE={:.6}",
        request.strategy,
        request.symbol,
        request.currency,
        elapsed,
        report.params,
        report.metrics.rmse
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::util::pre_processor::{records_to_dataframe, TimeSeriesRecord};

    fn records(n: usize) -> Vec<TimeSeriesRecord> {
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.25).sin() * 3.0 + i as f64 * 0.05;
                TimeSeriesRecord {
                    time: 1_700_000_000 + 600 * i as i64,
                    open: close - 0.1,
                    high: close + 0.5 + (i % 3) as f64 * 0.1,
                    low: close - 0.5 - (i % 5) as f64 * 0.1,
                    close,
                    volumefrom: 1000.0 + ((i * 37) % 101) as f64,
                    volumeto: 100_000.0 + ((i * 53) % 997) as f64 * 10.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_run_forecast_lag_strategies() {
        let df = records_to_dataframe(&records(60)).unwrap();
        for strategy in [ForecastStrategy::XGBoost, ForecastStrategy::Linear] {
            let request = ForecastRequest::new(strategy, "eth", "usd");
            let output = run_forecast(&df, &request).unwrap();
            let report = &output.report;

            // 60 rows, 3 lags dropped, 80/20 split
            assert_eq!(report.train_rows, 45);
            assert_eq!(report.test_rows, 12);
            assert_eq!(report.predictions.len(), 12);
            assert_eq!(report.symbol, "ETH");
            assert_eq!(output.artifact.lag_count, 3);
            assert_eq!(output.artifact.feature_names[0], "close_lag_1");
            assert!(report.metrics.rmse.is_finite());
        }
    }

    #[test]
    fn test_run_forecast_arimax_uses_exogenous_columns() {
        let df = records_to_dataframe(&records(80)).unwrap();
        let output = run_forecast(&df, &ForecastRequest::default()).unwrap();
        assert_eq!(output.artifact.lag_count, 0);
        assert_eq!(output.artifact.feature_names, vec!["volumefrom", "volumeto", "high", "low"]);
        assert_eq!(output.report.train_rows + output.report.test_rows, 80);
        assert_eq!(output.report.candidates, 18);
    }

    #[test]
    fn test_too_few_rows_for_lags_is_fatal() {
        let df = records_to_dataframe(&records(3)).unwrap();
        let request = ForecastRequest::new(ForecastStrategy::XGBoost, "ETH", "USD");
        assert!(matches!(
            run_forecast(&df, &request),
            Err(ForecastError::InsufficientData(_))
        ));
    }
}
