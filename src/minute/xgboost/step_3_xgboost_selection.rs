// Internal imports
use super::step_2_gradient_boosting::{GradientBoostedTrees, XGBoostParams};
use crate::constants::{
    XGB_LEARNING_RATES, XGB_MAX_CV_FOLDS, XGB_MAX_DEPTHS, XGB_N_ESTIMATORS, XGB_SUBSAMPLES,
};
use crate::error::Result;
use crate::minute::step_2_model_selection::{cross_val_mse, Estimator};
use crate::util::feature_engineering::FeatureFrame;
use crate::util::metrics::mean_squared_error;

/// Cartesian product of the hyperparameter lists, `subsample` varying fastest
pub fn default_xgboost_grid() -> Vec<XGBoostParams> {
    let mut grid = Vec::new();
    for &max_depth in XGB_MAX_DEPTHS.iter() {
        for &learning_rate in XGB_LEARNING_RATES.iter() {
            for &n_estimators in XGB_N_ESTIMATORS.iter() {
                for &subsample in XGB_SUBSAMPLES.iter() {
                    grid.push(XGBoostParams::new(max_depth, learning_rate, n_estimators, subsample));
                }
            }
        }
    }
    grid
}

impl Estimator for GradientBoostedTrees {
    type Params = XGBoostParams;

    fn fit(train: &FeatureFrame, params: &XGBoostParams) -> Result<Self> {
        GradientBoostedTrees::fit(train.features.view(), &train.target, *params)
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        GradientBoostedTrees::predict(self, frame.features.view())
    }

    /// Mean held-out MSE over `min(3, n)` contiguous folds. Too few rows to
    /// form two folds falls back to the in-sample MSE of a full fit.
    fn score(train: &FeatureFrame, params: &XGBoostParams) -> Result<(f64, Option<Self>)> {
        let folds = XGB_MAX_CV_FOLDS.min(train.len());
        if folds < 2 {
            log::warn!(
                "{} training rows, scoring {} in-sample",
                train.len(),
                params
            );
            let model = <Self as Estimator>::fit(train, params)?;
            let predictions = Estimator::predict(&model, train)?;
            return Ok((mean_squared_error(&train.target, &predictions), Some(model)));
        }
        Ok((cross_val_mse::<Self>(train, params, folds)?, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minute::step_2_model_selection::grid_search;
    use ndarray::Array2;

    fn lag_frame(n: usize) -> FeatureFrame {
        let series: Vec<f64> = (0..n + 3).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        FeatureFrame {
            times: (0..n as i64).collect(),
            feature_names: vec!["close_lag_1".to_string(), "close_lag_2".to_string(), "close_lag_3".to_string()],
            features: Array2::from_shape_fn((n, 3), |(i, j)| series[i + 2 - j]),
            target: series[3..].to_vec(),
        }
    }

    #[test]
    fn test_default_grid() {
        let grid = default_xgboost_grid();
        assert_eq!(grid.len(), 16);
        assert_eq!(grid[0], XGBoostParams::new(3, 0.05, 50, 0.8));
        assert_eq!(grid[1], XGBoostParams::new(3, 0.05, 50, 1.0));
        assert_eq!(grid[15], XGBoostParams::new(5, 0.1, 100, 1.0));
    }

    #[test]
    fn test_score_uses_cross_validation() {
        let train = lag_frame(30);
        let (score, model) = GradientBoostedTrees::score(&train, &XGBoostParams::new(3, 0.1, 20, 1.0)).unwrap();
        assert!(score.is_finite());
        assert!(model.is_none());
    }

    #[test]
    fn test_score_single_row_falls_back_to_in_sample() {
        let train = lag_frame(1);
        let (score, model) = GradientBoostedTrees::score(&train, &XGBoostParams::new(3, 0.1, 20, 1.0)).unwrap();
        assert!(score.is_finite());
        assert!(model.is_some());
    }

    #[test]
    fn test_grid_search_fits_best() {
        let train = lag_frame(24);
        let outcome = grid_search::<GradientBoostedTrees>(&train, &default_xgboost_grid()).unwrap();
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.model.params, outcome.params);
    }
}
