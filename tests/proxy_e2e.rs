//! End-to-end tests: real listener, real backends, in-memory capture.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use capture_proxy::capture::Direction;
use capture_proxy::resolve::{DnsFallback, Fallback};

mod common;

#[tokio::test]
async fn test_table_route_forwards_and_captures() {
    let (backend, hits) = common::start_echo_backend().await;
    let hosts = common::hosts_file("127.0.0.1 api.internal backup.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;

    let host = format!("api.internal:{}", backend.port());
    let response = common::client()
        .get(proxy.url("/hello?x=1"))
        .header("host", &host)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-echo-host"], host.as_str());
    assert_eq!(response.headers()["x-echo-target"], "/hello?x=1");
    assert_eq!(common::hits(&hits), 1);

    let records = proxy.sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].direction, Direction::Request);
    assert_eq!(records[1].direction, Direction::Response);
    assert_eq!(records[0].exchange, records[1].exchange);

    let request_dump = String::from_utf8_lossy(&records[0].bytes).to_string();
    assert!(request_dump.starts_with(&format!("GET /hello?x=1 HTTP/1.1\r\nHost: {}\r\n", host)));
    let response_dump = String::from_utf8_lossy(&records[1].bytes).to_string();
    assert!(response_dump.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[tokio::test]
async fn test_body_round_trips_through_capture() {
    let (backend, _hits) = common::start_echo_backend().await;
    let hosts = common::hosts_file("127.0.0.1 upload.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 253) as u8).collect();
    let response = common::client()
        .post(proxy.url("/upload"))
        .header("host", format!("upload.internal:{}", backend.port()))
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed = response.bytes().await.unwrap();
    assert_eq!(echoed.len(), payload.len());
    assert!(echoed[..] == payload[..]);

    let records = proxy.sink.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].bytes.ends_with(&payload));
    assert!(records[1].bytes.ends_with(&payload));
}

#[tokio::test]
async fn test_dns_fallback_route() {
    let (backend, hits) = common::start_echo_backend().await;
    let dns = common::start_fake_dns(&[("dns.internal", [127, 0, 0, 1])]).await;
    let hosts = common::hosts_file("# empty table\n");
    let fallback: Arc<dyn Fallback> =
        Arc::new(DnsFallback::new(&dns.to_string(), Duration::from_secs(2)));
    let proxy = common::start_proxy(&hosts, Some(fallback)).await;

    let response = common::client()
        .get(proxy.url("/via-dns"))
        .header("host", format!("dns.internal:{}", backend.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-echo-target"], "/via-dns");
    assert_eq!(common::hits(&hits), 1);
}

#[tokio::test]
async fn test_unknown_host_is_bad_gateway() {
    let (_backend, hits) = common::start_echo_backend().await;
    let dns = common::start_fake_dns(&[]).await;
    let hosts = common::hosts_file("127.0.0.1 api.internal\n");
    let fallback: Arc<dyn Fallback> =
        Arc::new(DnsFallback::new(&dns.to_string(), Duration::from_secs(2)));
    let proxy = common::start_proxy(&hosts, Some(fallback)).await;

    let response = common::client()
        .get(proxy.url("/"))
        .header("host", "missing.host")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.text().await.unwrap(), "Host not found: missing.host\n");
    assert_eq!(common::hits(&hits), 0);

    let records = proxy.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].direction, Direction::Request);
}

#[tokio::test]
async fn test_self_backend_is_loop_detected() {
    let (backend, hits) = common::start_echo_backend().await;
    let hosts = common::hosts_file("proxy.self looped.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;

    let response = common::client()
        .get(proxy.url("/"))
        .header("host", format!("looped.internal:{}", backend.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::LOOP_DETECTED);
    assert_eq!(common::hits(&hits), 0);
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway_without_response_capture() {
    let port = common::closed_port().await;
    let hosts = common::hosts_file("127.0.0.1 down.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;

    let response = common::client()
        .get(proxy.url("/"))
        .header("host", format!("down.internal:{}", port))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let records = proxy.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].direction, Direction::Request);
}

#[tokio::test]
async fn test_host_table_edits_apply_without_restart() {
    let (backend, hits) = common::start_echo_backend().await;
    let mut hosts = common::hosts_file("127.0.0.1 old.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;
    let client = common::client();

    let host = format!("new.internal:{}", backend.port());
    let response = client
        .get(proxy.url("/"))
        .header("host", &host)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    writeln!(hosts, "127.0.0.1 new.internal").unwrap();
    hosts.flush().unwrap();

    let response = client
        .get(proxy.url("/"))
        .header("host", &host)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::hits(&hits), 1);
}

#[tokio::test]
async fn test_concurrent_exchanges_stay_paired() {
    let (backend, _hits) = common::start_echo_backend().await;
    let hosts = common::hosts_file("127.0.0.1 api.internal\n");
    let proxy = common::start_proxy(&hosts, None).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        let url = proxy.url(&format!("/item/{}", i));
        let host = format!("api.internal:{}", backend.port());
        tasks.push(tokio::spawn(async move {
            client.get(url).header("host", host).send().await.unwrap().status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let records = proxy.sink.records();
    assert_eq!(records.len(), 32);
    for record in records.iter().filter(|r| r.direction == Direction::Request) {
        let target = String::from_utf8_lossy(&record.bytes)
            .split(' ')
            .nth(1)
            .unwrap()
            .to_string();
        let response = records
            .iter()
            .find(|r| r.exchange == record.exchange && r.direction == Direction::Response)
            .expect("every request capture has a response capture");
        // The echo backend reports the target it was asked for.
        let response_text = String::from_utf8_lossy(&response.bytes).to_lowercase();
        assert!(response_text.contains(&format!("x-echo-target: {}\r\n", target)));
    }
}
