// External crates
use nalgebra::{DMatrix, DVector};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

// Internal imports
use crate::constants::{ARIMAX_D_VALUES, ARIMAX_P_VALUES};
use crate::error::{ForecastError, Result};
use crate::util::regression::{companion_spectral_radius, least_squares};

/// Longest autoregression used to approximate innovations for MA terms
const MAX_LONG_AR_ORDER: usize = 10;

/// First target row every grid order can score, `max p + max d`.
///
/// Scoring all orders from the same row keeps their RMSEs comparable.
pub fn common_score_start() -> usize {
    ARIMAX_P_VALUES.iter().copied().max().unwrap_or(0) + ARIMAX_D_VALUES.iter().copied().max().unwrap_or(0)
}

/// ARIMA order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaxOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaxOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaxOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMAX({},{},{})", self.p, self.d, self.q)
    }
}

/// Fitted ARIMAX model on the `d`-times differenced target:
///
/// `y'_t = c + Σ φ_i y'_{t-i} + Σ θ_j e_{t-j} + β·x'_t + e_t`
///
/// The exogenous regressors are differenced alongside the target. The model
/// keeps just enough of the training tail to continue the recursion forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaxModel {
    pub order: ArimaxOrder,
    pub intercept: f64,
    pub ar_coeffs: Vec<f64>,
    pub ma_coeffs: Vec<f64>,
    pub exog_coeffs: Vec<f64>,
    pub sigma2: f64,
    pub aic: f64,
    /// In-sample one-step RMSE on the training target from [`common_score_start`]
    pub train_rmse: f64,
    /// Last `p` values of the differenced training target
    diff_tail: Vec<f64>,
    /// Last `q` in-sample residuals
    residual_tail: Vec<f64>,
    /// Last value of the target differenced `k` times, for `k` in `0..d`
    integration_tail: Vec<f64>,
    /// Last `d` exogenous rows of the training partition, row-major
    exog_tail: Vec<Vec<f64>>,
}

/// Difference a series `d` times
pub fn difference(data: &[f64], d: usize) -> Vec<f64> {
    let mut result = data.to_vec();
    for _ in 0..d {
        if result.len() < 2 {
            return vec![];
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Difference every column of a row-major matrix `d` times
fn difference_rows(rows: ArrayView2<'_, f64>, d: usize) -> Array2<f64> {
    let mut result = rows.to_owned();
    for _ in 0..d {
        if result.nrows() < 2 {
            return Array2::zeros((0, result.ncols()));
        }
        result = &result.slice(s![1.., ..]) - &result.slice(s![..-1, ..]);
    }
    result
}

/// Regress `y[t]` on `[1, y[t-1..=t-p], e[t-1..=t-q], x[t]]` for `t` in `start..n`
fn regress(
    y: &[f64],
    innovations: &[f64],
    exog: &Array2<f64>,
    p: usize,
    q: usize,
    start: usize,
) -> std::result::Result<DVector<f64>, String> {
    let n = y.len();
    let k = exog.ncols();
    let cols = 1 + p + q + k;
    if n <= start || n - start <= cols {
        return Err(format!(
            "{} usable observations for {} coefficients",
            n.saturating_sub(start),
            cols
        ));
    }
    let rows = n - start;
    let x = DMatrix::from_fn(rows, cols, |r, c| {
        let t = start + r;
        if c == 0 {
            1.0
        } else if c <= p {
            y[t - c]
        } else if c <= p + q {
            innovations[t - (c - p)]
        } else {
            exog[[t, c - 1 - p - q]]
        }
    });
    let target = DVector::from_fn(rows, |r, _| y[start + r]);
    least_squares(&x, &target)
}

impl ArimaxModel {
    /// Fit by conditional least squares (Hannan–Rissanen when `q > 0`).
    ///
    /// `exog` holds one row per target value. Failures are returned as
    /// `FitFailure` so a grid search can skip the order.
    pub fn fit(target: &[f64], exog: ArrayView2<'_, f64>, order: ArimaxOrder) -> Result<Self> {
        let fail = |reason: String| ForecastError::fit_failure(order, reason);
        let ArimaxOrder { p, d, q } = order;

        if exog.nrows() != target.len() {
            return Err(fail(format!(
                "{} exogenous rows for {} targets",
                exog.nrows(),
                target.len()
            )));
        }

        let yd = difference(target, d);
        let xd = difference_rows(exog, d);
        let m = yd.len();
        if m == 0 {
            return Err(fail(format!("{} observations cannot be differenced {} times", target.len(), d)));
        }
        let k = xd.ncols();
        let long_order = (p + q).max((m / 4).min(MAX_LONG_AR_ORDER)).max(1);

        // Innovations for the MA regressors
        let innovations = if q == 0 {
            vec![0.0; m]
        } else {
            let beta = regress(&yd, &vec![0.0; m], &xd, long_order, 0, long_order).map_err(fail)?;
            let mut e = vec![0.0; m];
            for t in long_order..m {
                let mut fitted = beta[0];
                for i in 1..=long_order {
                    fitted += beta[i] * yd[t - i];
                }
                for j in 0..k {
                    fitted += beta[1 + long_order + j] * xd[[t, j]];
                }
                e[t] = yd[t] - fitted;
            }
            e
        };

        let start = if q == 0 { p } else { p.max(long_order + q) };
        let beta = regress(&yd, &innovations, &xd, p, q, start).map_err(fail)?;

        let intercept = beta[0];
        let ar_coeffs: Vec<f64> = (1..=p).map(|i| beta[i]).collect();
        let ma_coeffs: Vec<f64> = (1..=q).map(|j| beta[p + j]).collect();
        let exog_coeffs: Vec<f64> = (0..k).map(|j| beta[1 + p + q + j]).collect();

        if companion_spectral_radius(&ar_coeffs) >= 1.0 {
            return Err(fail("non-stationary autoregressive part".to_string()));
        }
        let ma_recursion: Vec<f64> = ma_coeffs.iter().map(|t| -t).collect();
        if companion_spectral_radius(&ma_recursion) >= 1.0 {
            return Err(fail("non-invertible moving-average part".to_string()));
        }

        // Recursive one-step residuals over the whole differenced series
        let mut residuals = vec![0.0; m];
        for t in p..m {
            let mut fitted = intercept;
            for (i, phi) in ar_coeffs.iter().enumerate() {
                fitted += phi * yd[t - 1 - i];
            }
            for (j, theta) in ma_coeffs.iter().enumerate() {
                if t > j {
                    fitted += theta * residuals[t - 1 - j];
                }
            }
            for (j, b) in exog_coeffs.iter().enumerate() {
                fitted += b * xd[[t, j]];
            }
            residuals[t] = yd[t] - fitted;
        }

        let scored = &residuals[p..];
        if scored.is_empty() || scored.iter().any(|e| !e.is_finite()) {
            return Err(fail("residuals are not finite".to_string()));
        }
        let n_obs = scored.len() as f64;
        let sigma2 = scored.iter().map(|e| e * e).sum::<f64>() / n_obs;
        let log_likelihood =
            -0.5 * n_obs * (1.0 + (2.0 * std::f64::consts::PI * sigma2.max(f64::MIN_POSITIVE)).ln());
        let n_params = (1 + p + q + k) as f64;

        // Differenced index t is target row t + d, and one-step errors on the
        // differenced scale equal those on the level scale
        let window_start = common_score_start().max(p + d) - d;
        let window = &residuals[window_start.min(m)..];
        if window.is_empty() {
            return Err(fail(format!(
                "{} observations leave no rows to score from row {}",
                target.len(),
                window_start + d
            )));
        }
        let train_rmse = (window.iter().map(|e| e * e).sum::<f64>() / window.len() as f64).sqrt();

        let integration_tail: Vec<f64> = (0..d)
            .map(|level| *difference(target, level).last().unwrap_or(&0.0))
            .collect();
        let exog_tail: Vec<Vec<f64>> = (exog.nrows().saturating_sub(d)..exog.nrows())
            .map(|i| exog.row(i).to_vec())
            .collect();

        Ok(Self {
            order,
            intercept,
            ar_coeffs,
            ma_coeffs,
            exog_coeffs,
            sigma2,
            aic: -2.0 * log_likelihood + 2.0 * n_params,
            train_rmse,
            diff_tail: yd[m.saturating_sub(p)..].to_vec(),
            residual_tail: residuals[m.saturating_sub(q)..].to_vec(),
            integration_tail,
            exog_tail,
        })
    }

    pub fn n_exog(&self) -> usize {
        self.exog_coeffs.len()
    }

    /// Dynamic multi-step forecast, one value per row of `future_exog`.
    ///
    /// Autoregressive terms consume the model's own forecasts and future
    /// innovations are taken as zero; only the exogenous values are known.
    pub fn forecast(&self, future_exog: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if future_exog.ncols() != self.n_exog() {
            return Err(ForecastError::InvalidArgument(format!(
                "{} expects {} exogenous columns, got {}",
                self.order,
                self.n_exog(),
                future_exog.ncols()
            )));
        }
        let steps = future_exog.nrows();
        if steps == 0 {
            return Ok(vec![]);
        }

        let d = self.order.d;
        let future_diff = if d == 0 {
            future_exog.to_owned()
        } else {
            let tail_rows: Vec<f64> = self.exog_tail.iter().flatten().copied().collect();
            let tail = Array2::from_shape_vec((self.exog_tail.len(), self.n_exog()), tail_rows)
                .map_err(|e| ForecastError::InvalidArgument(e.to_string()))?;
            let stacked = concatenate(Axis(0), &[tail.view(), future_exog.reborrow()])
                .map_err(|e| ForecastError::InvalidArgument(e.to_string()))?;
            difference_rows(stacked.view(), d)
        };

        let mut history = self.diff_tail.clone();
        let mut innovations = self.residual_tail.clone();
        let mut levels = self.integration_tail.clone();
        let mut forecasts = Vec::with_capacity(steps);

        for h in 0..steps {
            let mut value = self.intercept;
            for (i, phi) in self.ar_coeffs.iter().enumerate() {
                if let Some(past) = history.len().checked_sub(1 + i).map(|idx| history[idx]) {
                    value += phi * past;
                }
            }
            for (j, theta) in self.ma_coeffs.iter().enumerate() {
                if let Some(past) = innovations.len().checked_sub(1 + j).map(|idx| innovations[idx]) {
                    value += theta * past;
                }
            }
            for (j, b) in self.exog_coeffs.iter().enumerate() {
                value += b * future_diff[[h, j]];
            }
            history.push(value);
            innovations.push(0.0);

            // Undo the differencing, innermost level first
            let mut level_value = value;
            for level in (0..d).rev() {
                level_value += levels[level];
                levels[level] = level_value;
            }
            forecasts.push(level_value);
        }

        Ok(forecasts)
    }
}
