//! Trainer service: `GET /train` runs one training cycle.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use ibov_forecast::Trainer;

pub struct TrainerState {
    pub trainer: Trainer,
}

pub fn router(state: TrainerState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/train", get(train))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({
        "status": "online",
        "message": "trainer service is running; GET /train starts a training cycle",
    }))
}

async fn train(State(state): State<Arc<TrainerState>>) -> Response {
    let task_state = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || task_state.trainer.run())
        .await
        .map_err(|join| join.to_string())
        .and_then(|result| result.map_err(|err| err.to_string()));

    match outcome {
        Ok(report) => Json(json!({
            "status": "success",
            "message": format!("model trained on {} observations and saved", report.rows),
            "model_path": report.artifact_path.display().to_string(),
            "order": report.order.to_string(),
            "aic": report.aic,
        }))
        .into_response(),
        Err(message) => {
            error!(error = %message, "training cycle failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "training failed",
                    "error": message,
                })),
            )
                .into_response()
        }
    }
}
