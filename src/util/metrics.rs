use serde::{Deserialize, Serialize};

/// Error metrics between actual and predicted values. Always computed as a set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "MdAE")]
    pub mdae: f64,
}

impl ForecastMetrics {
    /// Compare pairwise over the shorter of the two inputs.
    ///
    /// Returns `None` when there is nothing to compare.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return None;
        }
        Some(Self {
            rmse: root_mean_squared_error(&actual[..n], &predicted[..n]),
            mse: mean_squared_error(&actual[..n], &predicted[..n]),
            mae: mean_absolute_error(&actual[..n], &predicted[..n]),
            mdae: median_absolute_error(&actual[..n], &predicted[..n]),
        })
    }
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n as f64
}

pub fn median_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let mut errors: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    if errors.is_empty() {
        return f64::NAN;
    }
    errors.sort_by(|a, b| a.total_cmp(b));
    let mid = errors.len() / 2;
    if errors.len() % 2 == 0 {
        (errors[mid - 1] + errors[mid]) / 2.0
    } else {
        errors[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_example() {
        let m = ForecastMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]).unwrap();
        assert!((m.mae - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.mse - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(m.mdae, 0.0);
    }

    #[test]
    fn test_metrics_truncate_to_shorter() {
        let m = ForecastMetrics::compute(&[1.0, 2.0, 3.0, 100.0], &[2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.mae, 1.0);
        assert_eq!(m.rmse, 1.0);
        assert!(ForecastMetrics::compute(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_median_even_length() {
        assert_eq!(median_absolute_error(&[0.0, 0.0, 0.0, 0.0], &[1.0, 3.0, 2.0, 4.0]), 2.5);
    }

    #[test]
    fn test_metrics_serialize_with_upper_case_keys() {
        let m = ForecastMetrics::compute(&[1.0], &[2.0]).unwrap();
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["RMSE"], 1.0);
        assert_eq!(json["MdAE"], 1.0);
    }
}
