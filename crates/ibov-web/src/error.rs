use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use ibov_core::CoreError;
use ibov_forecast::ForecastError;
use ibov_warehouse::WarehouseError;

/// Failure surfaced by an HTTP handler.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("background task failed: {0}")]
    Join(String),
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for WebError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::Join(error.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), error = %self, "request failed");
        let body = Json(json!({
            "status": "error",
            "message": status.canonical_reason().unwrap_or("error"),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
