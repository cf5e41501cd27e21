// External imports
use polars::prelude::DataFrame;

// Internal imports
use crate::error::{ForecastError, Result};
use crate::util::feature_engineering::{build_features, FeatureFrame, FeatureSet};

/// Chronological train/test partition of an aligned feature frame
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: FeatureFrame,
    pub test: FeatureFrame,
    /// Set when the frame was too small to split and both halves are the full frame
    pub degenerate: bool,
}

/// Split index `max(1, floor(n · ratio))`
pub fn split_index(n: usize, train_ratio: f64) -> usize {
    ((n as f64 * train_ratio).floor() as usize).max(1)
}

/// Splits the frame into a training prefix and a test suffix
///
/// # Arguments
///
/// * `frame` - Aligned features and target, time ascending
/// * `train_ratio` - Share of rows used for training (0.0 to 1.0)
///
/// # Returns
///
/// Returns the partition. With fewer than two rows both partitions are the
/// whole frame (`degenerate`), so a single sample still trains and scores.
pub fn split_data(frame: &FeatureFrame, train_ratio: f64) -> Result<TrainTestSplit> {
    if !(0.0..=1.0).contains(&train_ratio) {
        return Err(ForecastError::InvalidArgument(format!(
            "train ratio {} must be between 0.0 and 1.0",
            train_ratio
        )));
    }
    let n = frame.len();
    if n == 0 {
        return Err(ForecastError::DataUnavailable(
            "no rows to partition".to_string(),
        ));
    }

    if n < 2 {
        log::warn!(
            "Only {} row available; training and testing on the same data",
            n
        );
        return Ok(TrainTestSplit {
            train: frame.clone(),
            test: frame.clone(),
            degenerate: true,
        });
    }

    let split_idx = split_index(n, train_ratio).min(n);
    Ok(TrainTestSplit {
        train: frame.slice_rows(0..split_idx),
        test: frame.slice_rows(split_idx..n),
        degenerate: false,
    })
}

/// Build features for `feature_set` from a preprocessed frame and partition them
pub fn prepare_training_data(
    df: &DataFrame,
    feature_set: &FeatureSet,
    train_ratio: f64,
) -> Result<TrainTestSplit> {
    if df.height() == 0 {
        return Err(ForecastError::DataUnavailable(
            "price history is empty".to_string(),
        ));
    }
    let frame = build_features(df, feature_set)?;
    let split = split_data(&frame, train_ratio)?;
    log::info!(
        "Training dataset size: {} rows, testing dataset size: {} rows",
        split.train.len(),
        split.test.len()
    );
    Ok(split)
}
