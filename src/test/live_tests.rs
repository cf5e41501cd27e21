use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use ndarray::arr1;
use tempfile::{tempdir, TempDir};

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::live::live_loop::{live_predictions, LiveEvent, LivePredictor, Observation};
use crate::minute::step_2_model_selection::ForecastStrategy;
use crate::minute::step_4_model_serialization::ModelArtifact;
use crate::minute::step_5_pipeline::{run_forecast_from_csv, ForecastRequest};
use crate::util::file_utils::{data_file_path, save_records_csv};
use crate::util::model_utils::load_trained_model;
use crate::util::pre_processor::TimeSeriesRecord;

fn trend_records(n: usize) -> Vec<TimeSeriesRecord> {
    (0..n)
        .map(|i| {
            let close = 30_000.0 + (i as f64 * 0.4).cos() * 120.0 + i as f64 * 2.0;
            TimeSeriesRecord {
                time: 1_700_000_000 + 60 * i as i64,
                open: close,
                high: close + 10.0 + (i % 5) as f64,
                low: close - 8.0 - (i % 3) as f64,
                close,
                volumefrom: 3.0 + (i % 7) as f64,
                volumeto: 90_000.0 + (i % 11) as f64 * 1000.0,
            }
        })
        .collect()
}

fn train_and_load(strategy: ForecastStrategy) -> (TempDir, Arc<ModelArtifact>) {
    let dir = tempdir().unwrap();
    let config = ForecastConfig {
        data_dir: dir.path().join("data"),
        model_dir: dir.path().join("models"),
        experiment_dir: dir.path().join("experiments"),
        ..ForecastConfig::default()
    };
    save_records_csv(&trend_records(50), data_file_path(&config.data_dir, "BTC", "USD")).unwrap();
    run_forecast_from_csv(&config, &ForecastRequest::new(strategy, "BTC", "USD")).unwrap();

    let (artifact, _) = load_trained_model(&config.model_dir, "BTC", strategy).unwrap();
    (dir, Arc::new(artifact))
}

#[tokio::test]
async fn test_saved_linear_model_drives_live_stream() {
    let (_dir, artifact) = train_and_load(ForecastStrategy::Linear);
    assert_eq!(artifact.lag_count, 3);

    let prices = [30_100.0, 30_110.0, 30_095.0, 30_120.0];
    let ticks: Vec<_> = prices
        .iter()
        .enumerate()
        .map(|(i, &value)| Ok(Observation { time: i as i64, value }))
        .collect();

    let predictor = LivePredictor::new(Arc::clone(&artifact)).unwrap();
    let events: Vec<LiveEvent> = live_predictions(stream::iter(ticks), predictor)
        .map(|e| e.unwrap())
        .collect()
        .await;

    assert!(matches!(events[0], LiveEvent::WarmingUp { time: 0, .. }));
    assert!(matches!(events[1], LiveEvent::WarmingUp { time: 1, .. }));

    // Newest observation is lag 1
    let expected_third = artifact
        .trained_model
        .predict_one(arr1(&[30_095.0, 30_110.0, 30_100.0]).view())
        .unwrap();
    let expected_fourth = artifact
        .trained_model
        .predict_one(arr1(&[30_120.0, 30_095.0, 30_110.0]).view())
        .unwrap();
    assert_eq!(
        events[2],
        LiveEvent::Prediction { time: 2, prediction: expected_third }
    );
    assert_eq!(
        events[3],
        LiveEvent::Prediction { time: 3, prediction: expected_fourth }
    );
    assert_eq!(events[3].time(), 3);
}

#[test]
fn test_saved_arimax_model_is_rejected_for_live_use() {
    let (_dir, artifact) = train_and_load(ForecastStrategy::Arimax);
    assert!(matches!(
        LivePredictor::new(artifact),
        Err(ForecastError::FeatureMismatch { .. })
    ));
}
