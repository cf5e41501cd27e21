// Internal imports
use super::step_1_arimax_model::{ArimaxModel, ArimaxOrder};
use crate::constants::{ARIMAX_D_VALUES, ARIMAX_P_VALUES, ARIMAX_Q_VALUES};
use crate::error::Result;
use crate::minute::step_2_model_selection::Estimator;
use crate::util::feature_engineering::FeatureFrame;

/// Every `(p, d, q)` combination, `q` varying fastest
pub fn default_arimax_grid() -> Vec<ArimaxOrder> {
    let mut grid = Vec::with_capacity(ARIMAX_P_VALUES.len() * ARIMAX_D_VALUES.len() * ARIMAX_Q_VALUES.len());
    for &p in ARIMAX_P_VALUES.iter() {
        for &d in ARIMAX_D_VALUES.iter() {
            for &q in ARIMAX_Q_VALUES.iter() {
                grid.push(ArimaxOrder::new(p, d, q));
            }
        }
    }
    grid
}

impl Estimator for ArimaxModel {
    type Params = ArimaxOrder;

    fn fit(train: &FeatureFrame, params: &ArimaxOrder) -> Result<Self> {
        ArimaxModel::fit(&train.target, train.features.view(), *params)
    }

    /// Forecasts continue from the end of the training data, so `frame` must
    /// be the rows immediately following it.
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        self.forecast(frame.features.view())
    }

    /// In-sample one-step RMSE of the full training fit, over the rows from
    /// `common_score_start` that every order in the grid can score
    fn score(train: &FeatureFrame, params: &ArimaxOrder) -> Result<(f64, Option<Self>)> {
        let model = <Self as Estimator>::fit(train, params)?;
        Ok((model.train_rmse, Some(model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minute::step_2_model_selection::grid_search;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_default_grid_order() {
        let grid = default_arimax_grid();
        assert_eq!(grid.len(), 18);
        assert_eq!(grid[0], ArimaxOrder::new(0, 0, 0));
        assert_eq!(grid[1], ArimaxOrder::new(0, 0, 1));
        assert_eq!(grid[3], ArimaxOrder::new(0, 1, 0));
        assert_eq!(grid[17], ArimaxOrder::new(2, 1, 2));
    }

    #[test]
    fn test_grid_search_selects_an_order() {
        let n = 120;
        let mut rng = StdRng::seed_from_u64(7);
        let exog = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64 + rng.random_range(0.0..1.0));
        let target: Vec<f64> = (0..n)
            .map(|i| 100.0 + 0.5 * exog[[i, 0]] + 0.1 * exog[[i, 1]] + rng.random_range(-0.5..0.5))
            .collect();
        let train = FeatureFrame {
            times: (0..n as i64).collect(),
            feature_names: vec!["a".to_string(), "b".to_string()],
            features: exog,
            target,
        };

        let outcome = grid_search::<ArimaxModel>(&train, &default_arimax_grid()).unwrap();
        assert_eq!(outcome.attempted, 18);
        assert!(outcome.score.is_finite());
        assert_eq!(outcome.score, outcome.model.train_rmse);
    }
}
