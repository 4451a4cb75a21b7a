//! Mode specifications driving real gateways over HTTP.

mod common;

use std::time::Duration;

use http::{HeaderValue, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use portico::middleware::{self, Next};
use portico::{CapabilityRegistry, Gateway, Request, Response};

async fn always_ok(_req: Request) -> Response {
    Response::text("backend says hi")
}

#[tokio::test]
async fn authz_rejects_requests_without_the_header() {
    let running = common::spawn(Gateway::default(), common::config().with_mode("authz"), always_ok).await;
    let client = reqwest::Client::new();

    let denied = client.get(running.url("/orders")).send().await.unwrap();
    assert_eq!(denied.status().as_u16(), 401);

    let allowed = client
        .get(running.url("/orders"))
        .header("authorization", "Bearer token")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);
    assert_eq!(allowed.text().await.unwrap(), "backend says hi");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_mode_serves_the_terminal_handler_alone() {
    let running = common::spawn(Gateway::default(), common::config(), always_ok).await;

    // No authz in the chain: a request without credentials goes straight through.
    let res = reqwest::get(running.url("/anything")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.text().await.unwrap(), "backend says hi");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn capabilities_run_in_declared_order() {
    // Each layer appends its name on the way in (request header) and on the
    // way out (response header).
    fn layer(name: &'static str) -> impl middleware::Middleware {
        middleware::from_fn(move |mut req: Request, next: Next| async move {
            let seen = req.header("x-path").unwrap_or("").to_owned();
            let value = HeaderValue::from_str(&format!("{seen}{name}>")).unwrap();
            req.headers_mut().insert("x-path", value);

            let mut res = next.run(req).await;
            let seen = res
                .headers()
                .get("x-return")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_owned();
            let value = HeaderValue::from_str(&format!("{seen}<{name}")).unwrap();
            res.headers_mut().insert("x-return", value);
            res
        })
    }

    let registry = CapabilityRegistry::new()
        .on("first", layer("first"))
        .on("second", layer("second"))
        .on("third", layer("third"));
    let terminal = |req: Request| async move { req.header("x-path").unwrap_or("").to_owned() };

    let running = common::spawn(
        Gateway::new(registry),
        common::config().with_mode("second|third|first"),
        terminal,
    )
    .await;

    let res = reqwest::get(running.url("/")).await.unwrap();
    assert_eq!(res.headers()["x-return"], "<first<third<second");
    assert_eq!(res.text().await.unwrap(), "second>third>first>");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn slow_chain_is_answered_with_gateway_timeout() {
    let slow = |_req: Request| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        StatusCode::OK
    };
    let config = common::config().with_write_timeout(Duration::from_millis(100));
    let running = common::spawn(Gateway::default(), config, slow).await;

    let res = reqwest::get(running.url("/slow")).await.unwrap();
    assert_eq!(res.status().as_u16(), 504);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

/// Reads until the end of the response head, or until the peer closes.
async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[tokio::test]
async fn stalled_request_body_is_answered_with_request_timeout() {
    let config = common::config().with_read_timeout(Duration::from_millis(100));
    let running = common::spawn(Gateway::default(), config, always_ok).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nHost: gateway\r\nContent-Length: 10\r\n\r\nabc")
        .await
        .unwrap();

    let head = tokio::time::timeout(Duration::from_secs(5), read_head(&mut stream))
        .await
        .expect("no answer to a stalled body");
    assert!(head.starts_with("HTTP/1.1 408"), "got {head:?}");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stalled_request_head_closes_the_connection() {
    let config = common::config().with_read_timeout(Duration::from_millis(100));
    let running = common::spawn(Gateway::default(), config, always_ok).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\nHost: gat").await.unwrap();

    // The handler never runs: no 200 arrives, and the connection is dropped.
    let head = tokio::time::timeout(Duration::from_secs(5), read_head(&mut stream))
        .await
        .expect("connection left open after the header read timeout");
    assert!(!head.contains(" 200 "), "got {head:?}");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}
