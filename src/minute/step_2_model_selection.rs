// External imports
use ndarray::{ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Internal imports
use crate::error::{ForecastError, Result};
use crate::minute::arimax::step_1_arimax_model::ArimaxModel;
use crate::minute::arimax::step_2_arimax_selection::default_arimax_grid;
use crate::minute::linear::step_1_linear_model::{LinearParams, LinearRegression};
use crate::minute::xgboost::step_2_gradient_boosting::GradientBoostedTrees;
use crate::minute::xgboost::step_3_xgboost_selection::default_xgboost_grid;
use crate::util::feature_engineering::{FeatureFrame, FeatureSet};
use crate::util::metrics::mean_squared_error;

/// A forecasting backend the shared pipeline can select, fit and evaluate.
pub trait Estimator: Sized + Send + Sync {
    type Params: Clone + fmt::Debug + fmt::Display + Send + Sync;

    /// Fit on the whole of `train`
    fn fit(train: &FeatureFrame, params: &Self::Params) -> Result<Self>;

    /// One prediction per row of `frame`, in row order
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>>;

    /// Selection score for `params` on `train`, lower is better.
    ///
    /// Backends that score by fitting on the full training set hand the
    /// fitted model back so it is not refitted after selection.
    fn score(train: &FeatureFrame, params: &Self::Params) -> Result<(f64, Option<Self>)>;
}

/// Best grid point and the model fitted with it on the full training set
#[derive(Debug)]
pub struct GridSearchOutcome<E: Estimator> {
    pub params: E::Params,
    pub score: f64,
    pub model: E,
    pub attempted: usize,
    pub failures: usize,
}

/// Exhaustive search over `grid`.
///
/// Candidates are scored in parallel, but selection walks the grid in order and
/// only replaces the incumbent on a strictly lower score, so the first of tied
/// candidates wins and repeated runs pick the same point. Candidates that fail
/// or score non-finite are skipped; if none survive the search fails with
/// `NoModelFitted`.
pub fn grid_search<E: Estimator>(
    train: &FeatureFrame,
    grid: &[E::Params],
) -> Result<GridSearchOutcome<E>> {
    let scored: Vec<Result<(f64, Option<E>)>> =
        grid.par_iter().map(|params| E::score(train, params)).collect();

    let mut best: Option<(usize, f64, Option<E>)> = None;
    let mut failures = 0;

    for (idx, (params, result)) in grid.iter().zip(scored).enumerate() {
        match result {
            Ok((score, model)) if score.is_finite() => {
                log::debug!("{} scored {:.6}", params, score);
                let better = best.as_ref().map_or(true, |(_, s, _)| score < *s);
                if better {
                    best = Some((idx, score, model));
                }
            }
            Ok((score, _)) => {
                log::warn!("Skipping {}: non-finite score {}", params, score);
                failures += 1;
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", params, e);
                failures += 1;
            }
        }
    }

    let (idx, score, model) = best.ok_or(ForecastError::NoModelFitted {
        attempted: grid.len(),
    })?;
    let params = grid[idx].clone();
    let model = match model {
        Some(model) => model,
        None => E::fit(train, &params)?,
    };

    log::info!(
        "Selected {} with score {:.6} ({} of {} candidates failed)",
        params,
        score,
        failures,
        grid.len()
    );

    Ok(GridSearchOutcome {
        params,
        score,
        model,
        attempted: grid.len(),
        failures,
    })
}

/// Contiguous, unshuffled k-fold splits as `(train_indices, test_indices)`.
///
/// The first `n % k` folds take one extra row.
pub fn kfold_indices(n: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    if k == 0 || n == 0 {
        return vec![];
    }
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let test: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n).collect();
        folds.push((train, test));
        start = end;
    }
    folds
}

/// Mean held-out MSE over contiguous k-fold splits of `train`
pub fn cross_val_mse<E: Estimator>(
    train: &FeatureFrame,
    params: &E::Params,
    folds: usize,
) -> Result<f64> {
    let splits = kfold_indices(train.len(), folds);
    if splits.len() < 2 {
        return Err(ForecastError::InsufficientData(format!(
            "{} rows cannot form {} folds",
            train.len(),
            folds
        )));
    }

    let mut total = 0.0;
    for (train_idx, test_idx) in &splits {
        let model = E::fit(&train.select_rows(train_idx), params)?;
        let held_out = train.select_rows(test_idx);
        let predictions = model.predict(&held_out)?;
        total += mean_squared_error(&held_out.target, &predictions);
    }
    Ok(total / splits.len() as f64)
}

/// Forecasting backend selectable per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastStrategy {
    Arimax,
    XGBoost,
    Linear,
}

impl ForecastStrategy {
    pub const ALL: [ForecastStrategy; 3] = [Self::Arimax, Self::XGBoost, Self::Linear];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Arimax => "arimax",
            Self::XGBoost => "xgboost",
            Self::Linear => "linear",
        }
    }

    /// ARIMAX regresses on the exogenous columns; the others on close lags
    pub fn feature_set(&self, lag_count: usize) -> FeatureSet {
        match self {
            Self::Arimax => FeatureSet::default_exogenous(),
            Self::XGBoost | Self::Linear => FeatureSet::Lagged(lag_count),
        }
    }
}

impl fmt::Display for ForecastStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ForecastStrategy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == lowered)
            .ok_or_else(|| {
                ForecastError::InvalidArgument(format!(
                    "Invalid model choice '{}'. Choose \"arimax\", \"xgboost\" or \"linear\".",
                    s
                ))
            })
    }
}

/// A fitted model of any strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedModel {
    Arimax(ArimaxModel),
    XGBoost(GradientBoostedTrees),
    Linear(LinearRegression),
}

impl TrainedModel {
    pub fn strategy(&self) -> ForecastStrategy {
        match self {
            Self::Arimax(_) => ForecastStrategy::Arimax,
            Self::XGBoost(_) => ForecastStrategy::XGBoost,
            Self::Linear(_) => ForecastStrategy::Linear,
        }
    }

    /// One prediction per row of `frame`
    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        match self {
            Self::Arimax(model) => Estimator::predict(model, frame),
            Self::XGBoost(model) => Estimator::predict(model, frame),
            Self::Linear(model) => Estimator::predict(model, frame),
        }
    }

    /// Prediction for a single feature vector in training column order.
    ///
    /// For ARIMAX this is the first step past the end of the training data.
    pub fn predict_one(&self, features: ArrayView1<'_, f64>) -> Result<f64> {
        let row = features.insert_axis(Axis(0));
        let predictions = match self {
            Self::Arimax(model) => model.forecast(row)?,
            Self::XGBoost(model) => model.predict(row)?,
            Self::Linear(model) => model.predict(row)?,
        };
        predictions.first().copied().ok_or_else(|| {
            ForecastError::InvalidArgument("model returned no prediction".to_string())
        })
    }
}

/// Winning model of a strategy's grid search
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub model: TrainedModel,
    /// Display form of the chosen grid point
    pub params: String,
    pub score: f64,
    pub attempted: usize,
    pub failures: usize,
}

fn summarize<E: Estimator>(outcome: GridSearchOutcome<E>, wrap: fn(E) -> TrainedModel) -> ModelSelection {
    ModelSelection {
        params: outcome.params.to_string(),
        score: outcome.score,
        attempted: outcome.attempted,
        failures: outcome.failures,
        model: wrap(outcome.model),
    }
}

/// Run the strategy's default grid on `train`.
///
/// ARIMAX candidates are ranked by in-sample one-step RMSE over a window
/// shared by every order, while XGBoost candidates are ranked by held-out
/// cross-validation MSE, so scores are not comparable across strategies.
pub fn select_model(strategy: ForecastStrategy, train: &FeatureFrame) -> Result<ModelSelection> {
    log::info!(
        "Selecting {} model on {} rows of {} features",
        strategy,
        train.len(),
        train.n_features()
    );
    let selection = match strategy {
        ForecastStrategy::Arimax => summarize(
            grid_search::<ArimaxModel>(train, &default_arimax_grid())?,
            TrainedModel::Arimax,
        ),
        ForecastStrategy::XGBoost => {
            let outcome = grid_search::<GradientBoostedTrees>(train, &default_xgboost_grid())?;
            let splits = outcome.model.feature_importance();
            log::debug!(
                "Split counts per feature: {:?}",
                train.feature_names.iter().zip(&splits).collect::<Vec<_>>()
            );
            summarize(outcome, TrainedModel::XGBoost)
        }
        ForecastStrategy::Linear => summarize(
            grid_search::<LinearRegression>(train, &[LinearParams])?,
            TrainedModel::Linear,
        ),
    };
    Ok(selection)
}
