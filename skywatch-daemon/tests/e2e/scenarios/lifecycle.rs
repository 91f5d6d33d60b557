//! Serve -> health -> shutdown over a real socket.

use axum::http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use skywatch_core::ProviderId;
use skywatch_daemon::daemon::Daemon;

use crate::helpers::api::*;
use crate::helpers::config::*;

/// `/health` reports degraded while no provider is connected.
#[tokio::test]
async fn test_e2e_health_without_providers_is_degraded() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");

    let (code, health) = get(&daemon.router(), "/health").await;

    assert_eq!(code, StatusCode::OK, "degraded still serves");
    assert_eq!(health["status"]["state"], "degraded");
    assert_eq!(health["broadcast"]["subscribers"], 0);

    daemon.shutdown().await;
}

/// After shutdown the hub is gone and `/health` turns 503.
#[tokio::test]
async fn test_e2e_health_after_hub_stops_is_unhealthy() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 1)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    let (code, _) = get(&app, "/health").await;
    assert_eq!(code, StatusCode::OK);

    daemon.shutdown().await;
    let (code, health) = get(&app, "/health").await;

    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"]["state"], "unhealthy");
}

/// run_until writes the PID file, serves HTTP, and cleans up on shutdown.
#[tokio::test]
async fn test_e2e_serve_and_shutdown() {
    // Given
    let pid_dir = tempfile::TempDir::new().expect("should create temp dir");
    let pid_path = pid_dir.path().join("run").join("skywatch.pid");
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 1)
        .pid_file(&pid_path)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind ephemeral port");
    let addr = listener.local_addr().expect("bound address");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    // When
    let client = async {
        let mut stream = TcpStream::connect(addr).await.expect("should connect");
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("should send request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("should read response");
        let pid_written = pid_path.exists();
        let _ = stop_tx.send(());
        (response, pid_written)
    };
    let server = daemon.run_until(listener, async {
        let _ = stop_rx.await;
    });
    let (served, (response, pid_written)) = tokio::time::timeout(WAIT, async {
        tokio::join!(server, client)
    })
    .await
    .expect("daemon should stop in time");

    // Then
    served.expect("run_until should succeed");
    assert!(
        response.starts_with("HTTP/1.1 200"),
        "unexpected response: {}",
        response
    );
    assert!(pid_written, "PID file should exist while serving");
    assert!(!pid_path.exists(), "PID file should be removed on shutdown");
}

/// A second instance with the same PID file refuses to start.
#[tokio::test]
async fn test_e2e_duplicate_pid_file_refuses_start() {
    let pid_dir = tempfile::TempDir::new().expect("should create temp dir");
    let pid_path = pid_dir.path().join("skywatch.pid");
    std::fs::write(&pid_path, "4242").expect("should write stale PID file");
    let (config, _dir) = TestConfigBuilder::new().pid_file(&pid_path).build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind ephemeral port");

    let result = daemon.run_until(listener, async {}).await;

    let err = result.expect_err("existing PID file must block startup");
    assert!(err.to_string().contains("4242"), "got: {}", err);
    assert!(pid_path.exists(), "the other instance's PID file is untouched");

    daemon.shutdown().await;
}
