//! Metrics exposition and instrument listing endpoints.

use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use shared::models::InstrumentSnapshot;

/// Query parameters for the instrument listing.
#[derive(Debug, Deserialize)]
pub struct InstrumentQueryParams {
    /// Only return the instrument with this metric name.
    pub name: Option<String>,
}

/// Response for the instrument listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct InstrumentListResponse {
    /// Matching instruments, sorted by name.
    pub instruments: Vec<InstrumentSnapshot>,
    /// Number of matching instruments.
    pub total_count: usize,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct MetricsError {
    /// Machine-readable error kind.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// Creates the landing page, telemetry and instrument listing routes.
///
/// The telemetry path is taken from `state` and must not collide with the other routes.
pub fn metrics_routes(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path().to_string();

    Router::new()
        .route("/", get(landing_page))
        .route(&telemetry_path, get(expose_metrics))
        .route("/api/v1/instruments", get(list_instruments))
        .with_state(state)
}

async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>
<head><title>Nginx Request Exporter</title></head>
<body>
<h1>Nginx Request Exporter</h1>
<p><a href='{}'>Metrics</a></p>
</body>
</html>
",
        state.telemetry_path()
    ))
}

async fn expose_metrics(State(state): State<AppState>) -> Response {
    let families = state.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn list_instruments(
    State(state): State<AppState>,
    Query(params): Query<InstrumentQueryParams>,
) -> Result<Json<InstrumentListResponse>, (StatusCode, Json<MetricsError>)> {
    let mut instruments = state.registry().snapshot().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(MetricsError {
                error: "registry_error".to_string(),
                message: e.to_string(),
            }),
        )
    })?;

    if let Some(name) = &params.name {
        instruments.retain(|i| &i.name == name);
    }

    let total_count = instruments.len();
    Ok(Json(InstrumentListResponse {
        instruments,
        total_count,
    }))
}
