//! Health check endpoint.
//!
//! Reports liveness plus the number of instruments created so far.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` if the registry cannot be read.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Number of histograms created from log lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruments: Option<usize>,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status, instruments) = match state.registry().count() {
        Ok(count) => (StatusCode::OK, "healthy", Some(count)),
        Err(e) => {
            tracing::error!(error = %e, "Health check could not read registry");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", None)
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            service: "nginx-request-exporter",
            version: env!("CARGO_PKG_VERSION"),
            instruments,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use shared::parser::parse_line;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_body() {
        let state = AppState::with_defaults().unwrap();
        state
            .registry()
            .record(&parse_line("request_time:0.1 bytes_sent:10").unwrap());

        let response = health_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "nginx-request-exporter");
        assert_eq!(health["instruments"], 2);
        assert!(health["version"].is_string());
    }
}
