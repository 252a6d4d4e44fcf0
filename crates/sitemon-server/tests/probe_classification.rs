//! Reachability probe classification against local sockets.

use sitemon_common::types::ProbeStatus;
use sitemon_server::probe::reach::{self, ReachPolicy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn fast_policy() -> ReachPolicy {
    ReachPolicy {
        timeout_secs: 10,
        slow_tld_timeout_secs: 10,
        max_redirects: 5,
        treat_http_errors_as_active: true,
    }
}

/// Serves every connection a fixed raw HTTP response.
async fn spawn_http_server(status_line: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

/// Binds and immediately drops a listener to find a port nothing is
/// listening on.
async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn ok_response_is_active() {
    let port = spawn_http_server("200 OK").await;
    let result = reach::probe(&fast_policy(), &format!("http://127.0.0.1:{port}")).await;
    assert_eq!(result.status, ProbeStatus::Active);
    assert_eq!(result.http_code, Some(200));
    assert_eq!(result.message, "HTTP 200");
}

#[tokio::test]
async fn server_error_still_counts_as_active() {
    let port = spawn_http_server("500 Internal Server Error").await;
    let result = reach::probe(&fast_policy(), &format!("http://127.0.0.1:{port}")).await;
    assert_eq!(result.status, ProbeStatus::Active);
    assert_eq!(result.http_code, Some(500));
}

#[tokio::test]
async fn server_error_is_inactive_when_opted_out() {
    let port = spawn_http_server("503 Service Unavailable").await;
    let policy = ReachPolicy {
        treat_http_errors_as_active: false,
        ..fast_policy()
    };
    let result = reach::probe(&policy, &format!("http://127.0.0.1:{port}")).await;
    assert_eq!(result.status, ProbeStatus::Inactive);
    assert_eq!(result.http_code, Some(503));
}

#[tokio::test]
async fn refused_connection_is_inactive_with_reason() {
    let port = unused_port().await;
    let result = reach::probe(&fast_policy(), &format!("http://127.0.0.1:{port}")).await;
    assert_eq!(result.status, ProbeStatus::Inactive);
    assert_eq!(result.http_code, None);
    assert_eq!(result.message, "Connection refused");
}

#[tokio::test]
async fn unresolvable_host_is_reported_as_domain_not_found() {
    let result = reach::probe(&fast_policy(), "no-such-host-sitemon.invalid").await;
    assert_eq!(result.status, ProbeStatus::Inactive);
    assert_eq!(result.message, "Domain not found");
}
