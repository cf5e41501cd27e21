use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ForecastError;

/// Error returned by route handlers, rendered as `{"error": ...}`.
#[derive(Debug)]
pub enum AppError {
    Forecast(ForecastError),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forecast(err) => match err {
                ForecastError::NotFound(_) => StatusCode::NOT_FOUND,
                ForecastError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                ForecastError::DataUnavailable(_)
                | ForecastError::MissingColumn(_)
                | ForecastError::FeatureMismatch { .. }
                | ForecastError::FitFailure { .. }
                | ForecastError::InsufficientData(_)
                | ForecastError::NoModelFitted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ForecastError::Upstream(_) | ForecastError::Http(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forecast(err) => write!(f, "{err}"),
            Self::BadRequest(msg) | Self::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        }
        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ForecastError> for AppError {
    fn from(e: ForecastError) -> Self {
        Self::Forecast(e)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        let message = format!("{e:#}");
        match e.downcast::<ForecastError>() {
            Ok(inner) => Self::Forecast(inner),
            Err(_) => Self::Internal(message),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("forecast task failed: {e}"))
    }
}
