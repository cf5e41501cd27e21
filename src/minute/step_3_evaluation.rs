// External imports
use polars::prelude::*;
use serde::{Deserialize, Serialize};

// Internal imports
use crate::constants::TIME_COLUMN;
use crate::error::{ForecastError, Result};
use crate::util::feature_engineering::FeatureFrame;
use crate::util::metrics::ForecastMetrics;

/// One evaluated test row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub time: i64,
    pub actual: f64,
    pub predicted: f64,
}

/// Predictions over the test partition with their error metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEvaluation {
    pub rows: Vec<PredictionRow>,
    pub metrics: ForecastMetrics,
}

impl ForecastEvaluation {
    /// Pair test rows with `predictions` in order and score them.
    ///
    /// When the two lengths differ both are truncated to the shorter one.
    pub fn new(test: &FeatureFrame, predictions: &[f64]) -> Result<Self> {
        if test.is_empty() {
            return Err(ForecastError::InsufficientData(
                "test partition is empty".to_string(),
            ));
        }
        if predictions.len() != test.len() {
            log::warn!(
                "{} predictions for {} test rows; truncating to the shorter",
                predictions.len(),
                test.len()
            );
        }

        let rows: Vec<PredictionRow> = test
            .times
            .iter()
            .zip(&test.target)
            .zip(predictions)
            .map(|((&time, &actual), &predicted)| PredictionRow {
                time,
                actual,
                predicted,
            })
            .collect();

        let actual: Vec<f64> = rows.iter().map(|r| r.actual).collect();
        let predicted: Vec<f64> = rows.iter().map(|r| r.predicted).collect();
        let metrics = ForecastMetrics::compute(&actual, &predicted).ok_or_else(|| {
            ForecastError::InsufficientData("no predictions to evaluate".to_string())
        })?;

        log::info!(
            "Evaluated {} rows: RMSE={:.6} MAE={:.6}",
            rows.len(),
            metrics.rmse,
            metrics.mae
        );
        Ok(Self { rows, metrics })
    }

    /// Result table `time, actual, predicted`
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        df! {
            TIME_COLUMN => self.rows.iter().map(|r| r.time).collect::<Vec<_>>(),
            "actual" => self.rows.iter().map(|r| r.actual).collect::<Vec<_>>(),
            "predicted" => self.rows.iter().map(|r| r.predicted).collect::<Vec<_>>()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn test_frame(target: Vec<f64>) -> FeatureFrame {
        let n = target.len();
        FeatureFrame {
            times: (0..n as i64).map(|t| 1_700_000_000 + 60 * t).collect(),
            feature_names: vec!["close_lag_1".to_string()],
            features: Array2::zeros((n, 1)),
            target,
        }
    }

    #[test]
    fn test_rows_align_with_test_partition() {
        let test = test_frame(vec![1.0, 2.0, 3.0]);
        let eval = ForecastEvaluation::new(&test, &[1.0, 2.0, 4.0]).unwrap();
        assert_eq!(eval.rows.len(), 3);
        assert_eq!(eval.rows[2].time, test.times[2]);
        assert_eq!(eval.rows[2].predicted, 4.0);
        assert!((eval.metrics.mae - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_truncates() {
        let test = test_frame(vec![1.0, 2.0, 3.0]);
        let eval = ForecastEvaluation::new(&test, &[1.0, 2.0]).unwrap();
        assert_eq!(eval.rows.len(), 2);
        assert_eq!(eval.metrics.rmse, 0.0);
    }

    #[test]
    fn test_empty_test_partition() {
        let test = test_frame(vec![]);
        assert!(matches!(
            ForecastEvaluation::new(&test, &[]),
            Err(ForecastError::InsufficientData(_))
        ));
        let test = test_frame(vec![1.0]);
        assert!(ForecastEvaluation::new(&test, &[]).is_err());
    }

    #[test]
    fn test_to_dataframe() {
        let test = test_frame(vec![5.0, 6.0]);
        let eval = ForecastEvaluation::new(&test, &[5.5, 6.5]).unwrap();
        let df = eval.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.get_column_names_str(), vec!["time", "actual", "predicted"]);
    }
}
