use thiserror::Error;

/// Errors raised by the forecasting core and its collaborators.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("No data available: {0}")]
    DataUnavailable(String),

    #[error("Required column {0} not found")]
    MissingColumn(String),

    #[error("Feature mismatch: model expects {expected:?}, live state produces {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A single candidate configuration failed to fit. Absorbed by the grid search.
    #[error("Fit failed for {params}: {reason}")]
    FitFailure { params: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No candidate out of {attempted} fitted successfully")]
    NoModelFitted { attempted: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Value not found: {0}")]
    NotFound(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Artifact encoding failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Artifact decoding failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

impl ForecastError {
    pub fn fit_failure(params: impl ToString, reason: impl ToString) -> Self {
        ForecastError::FitFailure {
            params: params.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
