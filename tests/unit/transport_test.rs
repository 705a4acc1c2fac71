//! Unit tests for the reqwest-backed transport against a local TCP server.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use vocab_gateway::services::transport::{HttpTransport, Transport};
use vocab_gateway::types::errors::{GatewayError, TransportError};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Reads one HTTP request (head plus Content-Length body) off the stream.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Serves a single request with `status` and `body`, handing back what was received.
async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        let _ = tx.send(request);
    });
    (url, rx)
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[tokio::test]
async fn test_success_returns_body_and_sends_headers() {
    let (url, received) = serve_once("200 OK", r#"{"ok":true}"#.to_string()).await;
    let transport = HttpTransport::new().unwrap();

    let body = transport
        .post(
            &url,
            &headers(&[("Authorization", "Bearer sk-1"), ("Content-Type", "application/json"), ("X-Trace", "abc")]),
            &json!({"model": "m"}),
            TIMEOUT,
        )
        .await
        .unwrap();
    assert_eq!(body, r#"{"ok":true}"#);

    let request = received.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /v1/chat"));
    assert!(lower.contains("authorization: bearer sk-1"));
    assert!(lower.contains("content-type: application/json"));
    assert!(lower.contains("x-trace: abc"));
    assert!(request.ends_with(r#"{"model":"m"}"#));
}

#[tokio::test]
async fn test_non_success_statuses_classify() {
    for (status, code) in [
        ("401 Unauthorized", "auth_failure"),
        ("429 Too Many Requests", "rate_limited"),
        ("500 Internal Server Error", "upstream_error"),
    ] {
        let (url, _received) = serve_once(status, r#"{"error":"nope"}"#.to_string()).await;
        let transport = HttpTransport::new().unwrap();
        let err = transport.post(&url, &headers(&[]), &json!({}), TIMEOUT).await.unwrap_err();

        let expected: u16 = status[..3].parse().unwrap();
        assert!(
            matches!(&err, TransportError::HttpStatus { status, body } if *status == expected && body == r#"{"error":"nope"}"#),
            "{:?}",
            err
        );
        let gateway: GatewayError = err.into();
        assert_eq!(gateway.code(), code);
        assert!(gateway.is_call_failure());
    }
}

#[tokio::test]
async fn test_error_body_truncated() {
    let (url, _received) = serve_once("500 Internal Server Error", "x".repeat(2000)).await;
    let transport = HttpTransport::new().unwrap();
    match transport.post(&url, &headers(&[]), &json!({}), TIMEOUT).await {
        Err(TransportError::HttpStatus { status: 500, body }) => assert_eq!(body.len(), 512),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let transport = HttpTransport::new().unwrap();
    let err = transport
        .post(&url, &headers(&[]), &json!({}), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Timeout(200));
}

#[tokio::test]
async fn test_unsendable_header_is_invalid_request() {
    let transport = HttpTransport::new().unwrap();
    let err = transport
        .post(
            "http://127.0.0.1:9/v1/chat",
            &headers(&[("Authorization", "Bearer sk-abc\n")]),
            &json!({}),
            TIMEOUT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidRequest(_)), "{:?}", err);

    let gateway: GatewayError = err.into();
    assert_eq!(gateway.code(), "validation_error");
    assert!(!gateway.is_call_failure());
}

#[tokio::test]
async fn test_refused_connection_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat", listener.local_addr().unwrap());
    drop(listener);

    let transport = HttpTransport::new().unwrap();
    let err = transport.post(&url, &headers(&[]), &json!({}), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)), "{:?}", err);
}
