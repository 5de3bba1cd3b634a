//! Integration tests for recording log lines and exposing them.
//!
//! Tests cover:
//! - Prometheus exposition of recorded histograms
//! - Label shape enforcement and the rejected-observation counter
//! - Parse failure accounting
//! - The JSON instrument listing

use axum::http::StatusCode;
use exporter::{create_router, AppState};
use shared::config::Buckets;
use shared::registry::MetricRegistry;
use std::sync::Arc;

use super::common::{get, get_text, test_app, test_pipeline};

#[tokio::test]
async fn test_line_to_exposition() {
    let buckets = Buckets::new(vec![0.005, 0.01, 0.025, 0.05, 0.1]).unwrap();
    let registry = Arc::new(MetricRegistry::new("nginx_request", buckets).unwrap());
    let state = AppState::new(registry, "/metrics");
    let app = create_router(state.clone());
    let (pipeline, _metrics) = test_pipeline(&state);

    let report = pipeline
        .process_line(r#"status:200 method=GET path="/api/v1" latency:0.023"#)
        .unwrap();
    assert_eq!(report.recorded, 2);

    let (status, body) = get_text(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let series = r#"method="GET",path="/api/v1""#;
    for expected in [
        format!(r#"nginx_request_latency_bucket{{{series},le="0.01"}} 0"#),
        format!(r#"nginx_request_latency_bucket{{{series},le="0.025"}} 1"#),
        format!(r#"nginx_request_latency_bucket{{{series},le="+Inf"}} 1"#),
        format!(r#"nginx_request_latency_count{{{series}}} 1"#),
        format!(r#"nginx_request_status_bucket{{{series},le="0.1"}} 0"#),
        format!(r#"nginx_request_status_bucket{{{series},le="+Inf"}} 1"#),
    ] {
        assert!(body.contains(&expected), "missing `{expected}` in:\n{body}");
    }
}

#[tokio::test]
async fn test_shape_mismatch_is_counted_and_listed() {
    let (app, state) = test_app();
    let (pipeline, _metrics) = test_pipeline(&state);

    pipeline.process_line("a:1 x=1 y=2").unwrap();
    let report = pipeline.process_line("a:2 y=2 x=1").unwrap();
    assert_eq!(report.recorded, 0);
    assert_eq!(report.rejected.len(), 1);

    let (_, body) = get_text(app.clone(), "/metrics").await;
    assert!(body.contains(r#"nginx_request_exporter_rejected_observations_total{metric="a"} 1"#));
    assert!(body.contains(r#"nginx_request_a_count{x="1",y="2"} 1"#));

    let (status, response) = get(app, "/api/v1/instruments?name=a").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 1);
    assert_eq!(response["instruments"][0]["rejected"], 1);
    assert_eq!(response["instruments"][0]["label_names"][0], "x");
    assert_eq!(response["instruments"][0]["label_names"][1], "y");
}

#[tokio::test]
async fn test_parse_failure_is_counted() {
    let (app, state) = test_app();
    let (pipeline, metrics) = test_pipeline(&state);

    tokio_test::assert_err!(pipeline.process_line("request_time 0.2"));
    tokio_test::assert_err!(pipeline.process_line(r#"path="/unterminated"#));
    tokio_test::assert_ok!(pipeline.process_line("request_time:0.2"));
    assert_eq!(metrics.parse_failures.get(), 2);

    let (_, body) = get_text(app, "/metrics").await;
    assert!(body.contains("nginx_request_exporter_syslog_parse_failure 2"));
    assert!(body.contains("nginx_request_request_time_count 1"));
}

#[tokio::test]
async fn test_instrument_listing_contains_histogram_data() {
    let (app, state) = test_app();
    let (pipeline, _metrics) = test_pipeline(&state);

    for line in [
        "request_time:0.02 method=GET",
        "request_time:0.7 method=GET",
        "request_time:3 method=POST",
    ] {
        pipeline.process_line(line).unwrap();
    }

    let (status, response) = get(app, "/api/v1/instruments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_count"], 1);

    let instrument = &response["instruments"][0];
    assert_eq!(instrument["name"], "request_time");
    assert_eq!(instrument["full_name"], "nginx_request_request_time");
    assert!(instrument["created_at"].is_string());

    let series = instrument["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["label_values"][0], "GET");
    assert_eq!(series[0]["histogram"]["count"], 2);
    assert_eq!(series[1]["label_values"][0], "POST");
    assert_eq!(series[1]["histogram"]["count"], 1);

    let buckets = series[0]["histogram"]["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), Buckets::default().len());
    assert_eq!(buckets[2]["upper_bound"], 0.025);
    assert_eq!(buckets[2]["count"], 1);
}
