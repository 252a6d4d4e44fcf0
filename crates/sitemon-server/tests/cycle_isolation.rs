//! End-to-end recheck cycles: per-target isolation and registry updates.

use sitemon_common::types::{ProbeStatus, TargetKind};
use sitemon_server::engine::Engine;
use sitemon_server::probe::reach::ReachPolicy;
use sitemon_server::sched::reach::ReachScheduler;
use sitemon_storage::{IncidentQuery, Store};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn setup_engine(dir: &TempDir) -> Arc<Engine> {
    sitemon_common::id::init(1, 1);
    let store = Arc::new(Store::open(dir.path(), 30).unwrap());
    let policy = ReachPolicy {
        timeout_secs: 10,
        slow_tld_timeout_secs: 10,
        max_redirects: 5,
        treat_http_errors_as_active: true,
    };
    Arc::new(Engine::new(store, None, policy, 5, 10))
}

async fn spawn_ok_server() -> u16 {
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
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn blank_url_yields_error_without_registration() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir);

    let result = engine.check_reachability("   ").await.unwrap();
    assert_eq!(result.status, ProbeStatus::Error);
    assert_eq!(result.message, "No URL provided");

    assert!(engine.list_targets().unwrap().is_empty());
    let incidents = engine.query_incidents(&IncidentQuery::default()).unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].status, ProbeStatus::Error);
}

#[tokio::test]
async fn ad_hoc_check_registers_target_and_records_result() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir);
    let port = spawn_ok_server().await;

    let url = format!("http://127.0.0.1:{port}");
    let result = engine.check_reachability(&url).await.unwrap();
    assert_eq!(result.status, ProbeStatus::Active);

    let target = engine
        .list_targets()
        .unwrap()
        .into_iter()
        .find(|t| t.url == url)
        .unwrap();
    assert_eq!(target.kind, TargetKind::AdHocCheck);
    assert_eq!(target.last_status, Some(ProbeStatus::Active));
    assert_eq!(target.last_code, Some(200));
    assert!(target.last_checked_at.is_some());
}

#[tokio::test]
async fn one_bad_target_does_not_block_the_rest() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir);
    let port = spawn_ok_server().await;
    let refused = unused_port().await;

    let good = format!("http://127.0.0.1:{port}");
    let dead = format!("http://127.0.0.1:{refused}");
    let bogus = "http://no-such-host-sitemon.invalid".to_string();
    engine.register_target(&good).unwrap();
    engine.register_target(&dead).unwrap();
    engine.register_target(&bogus).unwrap();

    let scheduler = ReachScheduler::new(engine.clone(), 300, 10);
    scheduler.run_cycle().await.unwrap();

    let targets = engine.list_targets().unwrap();
    assert_eq!(targets.len(), 3);
    for target in &targets {
        assert!(target.last_status.is_some(), "unchecked: {}", target.url);
        assert!(target.last_checked_at.is_some());
    }

    let by_url = |url: &str| {
        targets
            .iter()
            .find(|t| t.url == url)
            .unwrap()
            .last_status
            .unwrap()
    };
    assert_eq!(by_url(&good), ProbeStatus::Active);
    assert_eq!(by_url(&dead), ProbeStatus::Inactive);
    assert_eq!(by_url(&bogus), ProbeStatus::Inactive);

    let incidents = engine.query_incidents(&IncidentQuery::default()).unwrap();
    assert_eq!(incidents.len(), 3);
}
