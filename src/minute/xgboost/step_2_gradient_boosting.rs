// External crates
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal imports
use super::step_1_regression_tree::{RegressionTree, TreeNode, TreeParams};
use crate::constants::XGB_SEED;
use crate::error::{ForecastError, Result};

/// Hyperparameters of the boosted ensemble
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XGBoostParams {
    pub max_depth: usize,
    pub learning_rate: f64,
    pub n_estimators: usize,
    /// Fraction of training rows sampled without replacement for each tree
    pub subsample: f64,
    pub seed: u64,
}

impl XGBoostParams {
    pub fn new(max_depth: usize, learning_rate: f64, n_estimators: usize, subsample: f64) -> Self {
        Self {
            max_depth,
            learning_rate,
            n_estimators,
            subsample,
            seed: XGB_SEED,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.max_depth == 0 {
            return Err("max_depth must be at least 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(format!("learning_rate {} must be positive", self.learning_rate));
        }
        if self.n_estimators == 0 {
            return Err("n_estimators must be at least 1".to_string());
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(format!("subsample {} must be in (0, 1]", self.subsample));
        }
        Ok(())
    }
}

impl fmt::Display for XGBoostParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "XGBoost(max_depth={}, learning_rate={}, n_estimators={}, subsample={})",
            self.max_depth, self.learning_rate, self.n_estimators, self.subsample
        )
    }
}

/// Gradient-boosted regression trees under squared error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub params: XGBoostParams,
    /// Initial prediction, the training target mean
    pub base_score: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn fit(features: ArrayView2<'_, f64>, target: &[f64], params: XGBoostParams) -> Result<Self> {
        let fail = |reason: String| ForecastError::fit_failure(params, reason);
        params.validate().map_err(fail)?;

        let n = target.len();
        if n == 0 {
            return Err(fail("no training rows".to_string()));
        }
        if features.nrows() != n {
            return Err(fail(format!("{} feature rows for {} targets", features.nrows(), n)));
        }
        if target.iter().chain(features.iter()).any(|v| !v.is_finite()) {
            return Err(fail("non-finite value in training data".to_string()));
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            ..TreeParams::default()
        };
        let base_score = target.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let hessians = vec![1.0; n];
        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(params.seed);
        let all_rows: Vec<usize> = (0..n).collect();

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let gradients: Vec<f64> = predictions.iter().zip(target).map(|(p, y)| p - y).collect();
            let rows = if sample_size < n {
                let mut sampled = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                sampled.sort_unstable();
                sampled
            } else {
                all_rows.clone()
            };

            let mut tree = RegressionTree::fit(features, &gradients, &hessians, &rows, &tree_params);
            shrink(&mut tree, params.learning_rate);
            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += tree.predict_row(features.row(i));
            }
            trees.push(tree);
        }

        Ok(Self {
            params,
            base_score,
            n_features: features.ncols(),
            trees,
        })
    }

    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.n_features {
            return Err(ForecastError::InvalidArgument(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.ncols()
            )));
        }
        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    /// Number of splits on each feature across the ensemble
    pub fn feature_importance(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_features];
        for tree in &self.trees {
            tree.count_splits(&mut counts);
        }
        counts
    }
}

/// Scale every leaf by the learning rate
fn shrink(tree: &mut RegressionTree, eta: f64) {
    fn walk(node: &mut TreeNode, eta: f64) {
        match node {
            TreeNode::Leaf { value } => *value *= eta,
            TreeNode::Split { left, right, .. } => {
                walk(left, eta);
                walk(right, eta);
            }
        }
    }
    walk(&mut tree.root, eta);
}
