//! Collector service: one fetch → clean → upsert cycle per `GET /`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use ibov_core::{check_connectivity, Collector, HttpClient};

use crate::WebError;

pub struct CollectorState {
    pub collector: Collector,
    pub http: Arc<dyn HttpClient>,
    pub connectivity_url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectQuery {
    pub format: Option<String>,
}

pub fn router(state: CollectorState) -> Router {
    Router::new()
        .route("/", get(collect))
        .route("/test-connection", get(test_connection))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn collect(
    State(state): State<Arc<CollectorState>>,
    Query(query): Query<CollectQuery>,
) -> Result<Response, WebError> {
    let report = state.collector.run().await?;

    if query.format.as_deref() == Some("json") {
        return Ok(Json(report).into_response());
    }

    let range = match (report.first_date, report.last_date) {
        (Some(first), Some(last)) => format!(" ({first} to {last})"),
        _ => String::new(),
    };
    Ok(format!(
        "observations loaded: {} rows written{range}, {} rows stored\n",
        report.written_rows, report.table_rows
    )
    .into_response())
}

async fn test_connection(State(state): State<Arc<CollectorState>>) -> Response {
    let url = state.connectivity_url.as_str();
    match check_connectivity(state.http.as_ref(), url).await {
        Ok(status_code) => Json(json!({
            "msg": "connection test succeeded",
            "url": url,
            "status_code": status_code,
        }))
        .into_response(),
        Err(err) => {
            error!(url, error = %err, "connection test failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "msg": format!("could not connect to {url}"),
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ibov_core::{CsvMarketSource, HttpError, HttpResponse, ScriptedHttpClient};
    use ibov_warehouse::{Warehouse, WarehouseConfig};
    use tempfile::tempdir;
    use tower::ServiceExt;

    const EXPORT: &str = "Date,Close\n2024-01-02,100\n2024-01-03,101\n";

    fn app(
        temp: &tempfile::TempDir,
        export: Arc<ScriptedHttpClient>,
        probe: Arc<ScriptedHttpClient>,
    ) -> Router {
        router(CollectorState {
            collector: Collector::new(
                CsvMarketSource::new(export, "https://example.test/ibov.csv"),
                WarehouseConfig::in_home(temp.path()),
            ),
            http: probe,
            connectivity_url: String::from("https://probe.test"),
        })
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn collect_returns_report() {
        let temp = tempdir().expect("tempdir");
        let app = app(
            &temp,
            Arc::new(ScriptedHttpClient::repeating(EXPORT, 2)),
            Arc::new(ScriptedHttpClient::default()),
        );

        let (status, body) = get_body(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("observations loaded: 2 rows written"));

        let (status, body) = get_body(app, "/?format=json").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["table_rows"], 2);

        let reader = Warehouse::open_read_only(WarehouseConfig::in_home(temp.path())).expect("reader");
        assert_eq!(reader.count_observations(None).expect("count"), 2);
    }

    #[tokio::test]
    async fn collect_failure_is_a_500() {
        let temp = tempdir().expect("tempdir");
        let app = app(
            &temp,
            Arc::new(ScriptedHttpClient::new([Err(HttpError::new("connection failed"))])),
            Arc::new(ScriptedHttpClient::default()),
        );

        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("connection failed"));
    }

    #[tokio::test]
    async fn test_connection_reports_status_and_errors() {
        let temp = tempdir().expect("tempdir");
        let probe = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok("")),
            Err(HttpError::new("request timeout")),
        ]));
        let app = app(&temp, Arc::new(ScriptedHttpClient::default()), probe);

        let (status, body) = get_body(app.clone(), "/test-connection").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["url"], "https://probe.test");

        let (status, body) = get_body(app, "/test-connection").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("request timeout"));
    }
}
