// External crates
use nalgebra::{DMatrix, DVector};

const RANK_TOLERANCE: f64 = 1e-10;

/// Ordinary least squares `y ≈ X·β` solved by SVD on a column-scaled design.
///
/// Columns are divided by their largest absolute value before decomposition so
/// that prices, volumes and the intercept end up on comparable scales. A design
/// whose scaled rank is below its column count is rejected rather than solved.
pub fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, String> {
    let (rows, cols) = x.shape();
    if rows != y.len() {
        return Err(format!("design has {} rows, target has {}", rows, y.len()));
    }
    if rows < cols {
        return Err(format!("{} observations for {} coefficients", rows, cols));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err("non-finite value in regression input".to_string());
    }

    let scales: Vec<f64> = (0..cols)
        .map(|j| x.column(j).amax())
        .collect();
    if let Some(j) = scales.iter().position(|&s| s == 0.0) {
        return Err(format!("design column {} is identically zero", j));
    }
    let scaled = DMatrix::from_fn(rows, cols, |i, j| x[(i, j)] / scales[j]);

    let svd = scaled.svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = max_sv * RANK_TOLERANCE * rows.max(cols) as f64;
    if svd.rank(eps) < cols {
        return Err("singular design matrix".to_string());
    }
    let beta = svd.solve(y, eps).map_err(|e| e.to_string())?;

    Ok(DVector::from_fn(cols, |j, _| beta[j] / scales[j]))
}

/// Largest root modulus of the companion matrix for `x_t = Σ c_i x_{t-i}`.
///
/// A value below one means the recursion is stable.
pub fn companion_spectral_radius(coeffs: &[f64]) -> f64 {
    let n = coeffs.len();
    if n == 0 {
        return 0.0;
    }
    let companion = DMatrix::from_fn(n, n, |i, j| {
        if i == 0 {
            coeffs[j]
        } else if i == j + 1 {
            1.0
        } else {
            0.0
        }
    });
    companion
        .complex_eigenvalues()
        .iter()
        .map(|z| z.norm())
        .fold(0.0, f64::max)
}
