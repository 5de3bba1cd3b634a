//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use exporter::metrics::ExporterMetrics;
use exporter::{create_router, AppState};
use exporter::ingest::Pipeline;
use http_body_util::BodyExt;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Creates a test router with a fresh registry.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::with_defaults().unwrap();
    let router = create_router(state.clone());
    (router, state)
}

/// Creates a pipeline recording into the registry of `state`.
///
/// The exporter counters are registered in the same registry, so they show up in the
/// exposition.
pub fn test_pipeline(state: &AppState) -> (Pipeline, ExporterMetrics) {
    let metrics =
        ExporterMetrics::register(state.registry().prometheus_registry(), "nginx_request")
            .unwrap();
    (
        Pipeline::new(state.registry_handle(), metrics.clone()),
        metrics,
    )
}

/// Helper to make a GET request and read the body as text.
///
/// # Returns
///
/// A tuple containing the response status code and the response body.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// Helper to make a GET request.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get_text(app, uri).await;
    let json: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    (status, json)
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met within timeout");
}
