//! Integration tests for the ingestion transports.
//!
//! Tests cover:
//! - Syslog datagrams flowing through the pipeline into the exposition
//! - Access log tailing, including truncation

use exporter::ingest::{line_channel, FileTailer, SyslogListener};
use exporter::SyslogAddress;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::common::{get_text, test_app, test_pipeline, wait_until};

#[tokio::test]
async fn test_syslog_to_exposition() {
    let (app, state) = test_app();
    let (pipeline, metrics) = test_pipeline(&state);

    let listener = SyslogListener::bind(
        &SyslogAddress::Udp("127.0.0.1:0".to_string()),
        "nginx",
        metrics.clone(),
    )
    .await
    .unwrap();
    let addr = listener.local_addr();

    let (line_tx, line_rx) = line_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let transport = tokio::spawn(listener.run(line_tx, shutdown_rx));
    let processor = tokio::spawn(pipeline.run(line_rx));

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for datagram in [
        &b"<190>Oct 16 12:00:00 web-1 nginx: request_time:0.042 method=GET"[..],
        b"<190>Oct 16 12:00:00 web-1 nginx: request_time:0.3 method=GET",
        b"<190>Oct 16 12:00:00 web-1 cron: request_time:1 method=GET",
        b"<190>Oct 16 12:00:00 web-1 nginx: broken line",
    ] {
        client.send_to(datagram, &addr).await.unwrap();
    }

    let registry = state.registry_handle();
    wait_until(|| {
        let registry = registry.clone();
        let metrics = metrics.clone();
        async move {
            metrics.parse_failures.get() == 2
                && registry
                    .snapshot()
                    .unwrap()
                    .first()
                    .is_some_and(|i| i.total_count() == 2)
        }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    transport.await.unwrap();
    processor.await.unwrap();

    let (_, body) = get_text(app, "/metrics").await;
    assert!(body.contains(r#"nginx_request_request_time_count{method="GET"} 2"#));
    assert!(body.contains("nginx_request_exporter_syslog_messages 4"));
    assert!(body.contains("nginx_request_exporter_syslog_parse_failure 2"));
}

#[tokio::test]
async fn test_tail_to_registry() {
    let (_app, state) = test_app();
    let (pipeline, _metrics) = test_pipeline(&state);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(&path, "request_time:0.1 vhost=a\n").unwrap();

    let tailer = FileTailer::open(&path, Duration::from_millis(10))
        .await
        .unwrap();
    let (line_tx, line_rx) = line_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let transport = tokio::spawn(tailer.run(line_tx, shutdown_rx));
    let processor = tokio::spawn(pipeline.run(line_rx));

    let registry = state.registry_handle();
    let total = move || {
        let registry = registry.clone();
        async move {
            registry
                .snapshot()
                .unwrap()
                .first()
                .map_or(0, shared::models::InstrumentSnapshot::total_count)
        }
    };

    wait_until(|| {
        let total = total.clone();
        async move { total().await == 1 }
    })
    .await;

    // Truncate and write fresh content, as copytruncate rotation does.
    std::fs::write(&path, "request_time:2 vhost=b\n").unwrap();
    wait_until(|| {
        let total = total.clone();
        async move { total().await == 2 }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    transport.await.unwrap();
    processor.await.unwrap();

    let snapshot = state.registry().snapshot().unwrap();
    assert!(snapshot[0].series_for(&["a"]).is_some());
    assert!(snapshot[0].series_for(&["b"]).is_some());
}
