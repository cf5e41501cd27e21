// External crates
use ndarray::{s, Array2, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

// Local modules
use crate::constants::{EXOGENOUS_COLUMNS, TARGET_COLUMN, TIME_COLUMN};
use crate::error::{ForecastError, Result};
use crate::util::pre_processor::{f64_column, time_values};

/// Which input features a strategy is trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureSet {
    /// Source columns taken verbatim at the same timestamp
    Exogenous(Vec<String>),
    /// `{target}_lag_1 ..= {target}_lag_k`
    Lagged(usize),
}

impl FeatureSet {
    pub fn default_exogenous() -> Self {
        FeatureSet::Exogenous(EXOGENOUS_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    /// Number of lags the live buffer must hold; zero for exogenous features
    pub fn lag_count(&self) -> usize {
        match self {
            FeatureSet::Exogenous(_) => 0,
            FeatureSet::Lagged(k) => *k,
        }
    }
}

/// Feature matrix aligned row-for-row with its target and timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub times: Vec<i64>,
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub target: Vec<f64>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.features.row(idx)
    }

    /// Copy of the rows in `range`, keeping all three parts aligned
    pub fn slice_rows(&self, range: Range<usize>) -> FeatureFrame {
        FeatureFrame {
            times: self.times[range.clone()].to_vec(),
            feature_names: self.feature_names.clone(),
            features: self.features.slice(s![range.clone(), ..]).to_owned(),
            target: self.target[range].to_vec(),
        }
    }

    /// Rows selected by index, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> FeatureFrame {
        let mut features = Array2::zeros((indices.len(), self.n_features()));
        for (out_idx, &src_idx) in indices.iter().enumerate() {
            features.row_mut(out_idx).assign(&self.features.row(src_idx));
        }
        FeatureFrame {
            times: indices.iter().map(|&i| self.times[i]).collect(),
            feature_names: self.feature_names.clone(),
            features,
            target: indices.iter().map(|&i| self.target[i]).collect(),
        }
    }

    fn from_dataframe(df: &DataFrame, feature_names: Vec<String>, target: &str) -> Result<Self> {
        let times = time_values(df)?;
        let target = f64_column(df, target)?;
        let mut features = Array2::zeros((df.height(), feature_names.len()));
        for (j, name) in feature_names.iter().enumerate() {
            let values = f64_column(df, name)?;
            for (i, v) in values.into_iter().enumerate() {
                features[[i, j]] = v;
            }
        }
        Ok(FeatureFrame {
            times,
            feature_names,
            features,
            target,
        })
    }
}

/// Column names produced for `lag_count` lags of `target`, most recent first
pub fn lag_feature_names(target: &str, lag_count: usize) -> Vec<String> {
    (1..=lag_count)
        .map(|lag| format!("{}_lag_{}", target, lag))
        .collect()
}

/// Calculates lagged features for a given column
pub fn calculate_lagged_features(
    df: &DataFrame,
    column: &str,
    lags: &[usize],
) -> PolarsResult<Vec<Series>> {
    let series = df.column(column)?.as_materialized_series().clone();
    let mut result = Vec::with_capacity(lags.len());

    for &lag in lags {
        let lagged = series.shift(lag as i64);
        let name = format!("{}_lag_{}", column, lag);
        result.push(lagged.with_name(name.into()));
    }

    Ok(result)
}

fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for col in columns {
        if !df.schema().contains(col) {
            return Err(ForecastError::MissingColumn(col.to_string()));
        }
    }
    Ok(())
}

/// Lag-mode features: `{target}_lag_i` is the target shifted `i` rows into the past
///
/// The first `lag_count` rows have an undefined lag and are dropped together
/// with their target values, so the frame has `n - lag_count` rows.
pub fn build_lagged_features(df: &DataFrame, target: &str, lag_count: usize) -> Result<FeatureFrame> {
    if lag_count == 0 {
        return Err(ForecastError::InvalidArgument(
            "lag count must be at least 1".to_string(),
        ));
    }
    require_columns(df, &[TIME_COLUMN, target])?;

    let n = df.height();
    if n <= lag_count {
        return Err(ForecastError::InsufficientData(format!(
            "{} rows cannot provide {} lags",
            n, lag_count
        )));
    }

    let lags: Vec<usize> = (1..=lag_count).collect();
    let mut columns: Vec<Column> = vec![
        df.column(TIME_COLUMN)?.clone(),
        df.column(target)?.clone(),
    ];
    for lagged in calculate_lagged_features(df, target, &lags)? {
        columns.push(lagged.into_column());
    }
    let shifted = DataFrame::new(columns)?.slice(lag_count as i64, n - lag_count);

    FeatureFrame::from_dataframe(&shifted, lag_feature_names(target, lag_count), target)
}

/// Exogenous-mode features: columns copied verbatim, no shift
pub fn build_exogenous_features(
    df: &DataFrame,
    target: &str,
    columns: &[String],
) -> Result<FeatureFrame> {
    let mut required: Vec<&str> = vec![TIME_COLUMN, target];
    required.extend(columns.iter().map(|c| c.as_str()));
    require_columns(df, &required)?;

    FeatureFrame::from_dataframe(df, columns.to_vec(), target)
}

/// Build the frame for a feature set against the closing price
pub fn build_features(df: &DataFrame, feature_set: &FeatureSet) -> Result<FeatureFrame> {
    match feature_set {
        FeatureSet::Exogenous(columns) => build_exogenous_features(df, TARGET_COLUMN, columns),
        FeatureSet::Lagged(k) => build_lagged_features(df, TARGET_COLUMN, *k),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes_df(closes: &[f64]) -> DataFrame {
        let times: Vec<i64> = (0..closes.len() as i64).map(|i| i * 60).collect();
        DataFrame::new(vec![
            Series::new("time".into(), times).into(),
            Series::new("close".into(), closes.to_vec()).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_lagged_features_scenario() {
        let df = closes_df(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let frame = build_lagged_features(&df, "close", 2).unwrap();

        assert_eq!(frame.feature_names, vec!["close_lag_1", "close_lag_2"]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.row(0).to_vec(), vec![11.0, 10.0]);
        assert_eq!(frame.row(1).to_vec(), vec![12.0, 11.0]);
        assert_eq!(frame.row(2).to_vec(), vec![13.0, 12.0]);
        assert_eq!(frame.target, vec![12.0, 13.0, 14.0]);
        assert_eq!(frame.times, vec![120, 180, 240]);
    }

    #[test]
    fn test_lagged_features_index_property() {
        let closes: Vec<f64> = (0..20).map(|i| (i * i) as f64).collect();
        let df = closes_df(&closes);
        for k in 1..6 {
            let frame = build_lagged_features(&df, "close", k).unwrap();
            assert_eq!(frame.len(), closes.len() - k);
            for i in 0..frame.len() {
                for j in 1..=k {
                    assert_eq!(frame.features[[i, j - 1]], closes[i + k - j]);
                }
                assert_eq!(frame.target[i], closes[i + k]);
            }
        }
    }

    #[test]
    fn test_lagged_features_insufficient_rows() {
        let df = closes_df(&[1.0, 2.0]);
        assert!(matches!(
            build_lagged_features(&df, "close", 2),
            Err(ForecastError::InsufficientData(_))
        ));
        assert!(matches!(
            build_lagged_features(&df, "close", 0),
            Err(ForecastError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_exogenous_features_verbatim() {
        let df = DataFrame::new(vec![
            Series::new("time".into(), vec![0i64, 60]).into(),
            Series::new("close".into(), vec![1.0, 2.0]).into(),
            Series::new("volumefrom".into(), vec![5.0, 6.0]).into(),
            Series::new("volumeto".into(), vec![50.0, 60.0]).into(),
            Series::new("high".into(), vec![1.5, 2.5]).into(),
            Series::new("low".into(), vec![0.5, 1.5]).into(),
        ])
        .unwrap();
        let frame = build_features(&df, &FeatureSet::default_exogenous()).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.row(1).to_vec(), vec![6.0, 60.0, 2.5, 1.5]);
        assert_eq!(frame.target, vec![1.0, 2.0]);
    }

    #[test]
    fn test_exogenous_features_missing_column() {
        let df = closes_df(&[1.0, 2.0, 3.0]);
        let result = build_features(&df, &FeatureSet::default_exogenous());
        assert!(matches!(result, Err(ForecastError::MissingColumn(c)) if c == "volumefrom"));
    }

    #[test]
    fn test_select_rows_keeps_alignment() {
        let df = closes_df(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let frame = build_lagged_features(&df, "close", 1).unwrap();
        let picked = frame.select_rows(&[3, 0]);
        assert_eq!(picked.target, vec![14.0, 11.0]);
        assert_eq!(picked.row(0).to_vec(), vec![13.0]);
        assert_eq!(picked.times, vec![240, 60]);
    }
}
