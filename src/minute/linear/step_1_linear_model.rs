// External crates
use nalgebra::{DMatrix, DVector};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal imports
use crate::error::{ForecastError, Result};
use crate::minute::step_2_model_selection::Estimator;
use crate::util::feature_engineering::FeatureFrame;
use crate::util::metrics::mean_squared_error;
use crate::util::regression::least_squares;

/// The linear baseline has no hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinearParams;

impl fmt::Display for LinearParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OLS")
    }
}

/// `y = intercept + Σ coefficients[j] · x_j`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    pub fn fit(features: ArrayView2<'_, f64>, target: &[f64]) -> Result<Self> {
        let (rows, cols) = features.dim();
        if rows != target.len() {
            return Err(ForecastError::fit_failure(
                LinearParams,
                format!("{} feature rows for {} targets", rows, target.len()),
            ));
        }
        let x = DMatrix::from_fn(rows, cols + 1, |i, j| if j == 0 { 1.0 } else { features[[i, j - 1]] });
        let y = DVector::from_column_slice(target);
        let beta = least_squares(&x, &y).map_err(|e| ForecastError::fit_failure(LinearParams, e))?;

        Ok(Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }

    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.coefficients.len() {
            return Err(ForecastError::InvalidArgument(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.ncols()
            )));
        }
        Ok(features
            .rows()
            .into_iter()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, b)| x * b)
                        .sum::<f64>()
            })
            .collect())
    }
}

impl Estimator for LinearRegression {
    type Params = LinearParams;

    fn fit(train: &FeatureFrame, _params: &LinearParams) -> Result<Self> {
        LinearRegression::fit(train.features.view(), &train.target)
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        LinearRegression::predict(self, frame.features.view())
    }

    fn score(train: &FeatureFrame, params: &LinearParams) -> Result<(f64, Option<Self>)> {
        let model = <Self as Estimator>::fit(train, params)?;
        let predictions = Estimator::predict(&model, train)?;
        Ok((mean_squared_error(&train.target, &predictions), Some(model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_recovers_lag_relationship() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 3) % 7) as f64 });
        let y: Vec<f64> = (0..20).map(|i| 5.0 + 0.9 * x[[i, 0]] - 2.0 * x[[i, 1]]).collect();
        let model = LinearRegression::fit(x.view(), &y).unwrap();
        assert!((model.intercept - 5.0).abs() < 1e-8);
        assert!((model.coefficients[0] - 0.9).abs() < 1e-8);
        assert!((model.coefficients[1] + 2.0).abs() < 1e-8);

        let predictions = model.predict(x.view()).unwrap();
        assert!(mean_squared_error(&y, &predictions) < 1e-12);
    }

    #[test]
    fn test_underdetermined_fit_fails() {
        let x = Array2::from_shape_fn((2, 3), |(i, j)| (i + j) as f64);
        assert!(matches!(
            LinearRegression::fit(x.view(), &[1.0, 2.0]),
            Err(ForecastError::FitFailure { .. })
        ));
    }
}
