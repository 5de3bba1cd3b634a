//! Integration tests for the health check and landing page.

use axum::http::StatusCode;

use super::common::{get, get_text, test_app, test_pipeline};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "nginx-request-exporter");
    assert_eq!(response["instruments"], 0);
}

#[tokio::test]
async fn test_health_counts_instruments() {
    let (app, state) = test_app();
    let (pipeline, _metrics) = test_pipeline(&state);

    pipeline.process_line("request_time:0.1 upstream_time:0.05").unwrap();

    let (_, response) = get(app, "/health").await;
    assert_eq!(response["instruments"], 2);
}

#[tokio::test]
async fn test_empty_registry_returns_empty_results() {
    let (app, _state) = test_app();

    let (status, response) = get(app.clone(), "/api/v1/instruments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 0);
    assert!(response["instruments"].as_array().unwrap().is_empty());

    let (status, body) = get_text(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("_bucket"));

    let (status, body) = get_text(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<h1>Nginx Request Exporter</h1>"));
}
