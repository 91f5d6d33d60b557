//! Trigger -> progress -> completed status over the HTTP API.

use axum::http::{Method, StatusCode};
use serde_json::json;

use skywatch_core::ProviderId;
use skywatch_daemon::daemon::Daemon;

use crate::helpers::api::*;
use crate::helpers::config::*;

/// aws=5, gcp export unreadable, azure=2 -> 7 resources, gcp counted 0.
#[tokio::test]
async fn test_e2e_partial_failure_scan() {
    // Given
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 5)
        .provider_missing_export(ProviderId::Gcp)
        .provider(ProviderId::Azure, 2)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    // When
    let (code, body) = post(&app, "/api/scans").await;
    let status = wait_for_completion(&app).await;

    // Then
    assert_eq!(code, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");
    assert_eq!(status["jobId"], body["jobId"], "status must describe the started job");
    assert_eq!(status["numResources"], 7);
    assert_eq!(
        status["providerCounts"],
        json!({"aws": 5, "gcp": 0, "azure": 2})
    );
    assert_eq!(status["failedProviders"], json!(["gcp"]));
    assert_eq!(status["progress"], 100);
    assert_eq!(status["outcome"], "succeeded");

    daemon.shutdown().await;
}

/// Two rapid triggers -> one job; the second caller sees it running.
#[tokio::test]
async fn test_e2e_second_trigger_joins_running_job() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 3)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let (first_code, first) = post(&app, "/api/scans").await;
    let (second_code, second) = post(&app, "/api/scans").await;

    assert_eq!(first_code, StatusCode::ACCEPTED);
    if second_code == StatusCode::OK {
        // Still running: the in-flight status comes back
        assert_eq!(second["jobId"], first["jobId"]);
        assert_eq!(second["running"], true);
    } else {
        // The first job already finished; a new one was accepted
        assert_eq!(second_code, StatusCode::ACCEPTED);
        assert_ne!(second["jobId"], first["jobId"]);
    }

    wait_for_completion(&app).await;
    daemon.shutdown().await;
}

/// Status before any scan is idle, not an error.
#[tokio::test]
async fn test_e2e_status_before_first_scan() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let (code, status) = get(&app, "/api/scans/status").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(status["phase"], "idle");
    assert_eq!(status["running"], false);
    assert_eq!(status["progress"], 0);
    assert!(status["jobId"].is_null());

    daemon.shutdown().await;
}

/// Cancel without a running job -> 409.
#[tokio::test]
async fn test_e2e_cancel_without_job_conflicts() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let (code, body) = post(&app, "/api/scans/cancel").await;

    assert_eq!(code, StatusCode::CONFLICT);
    assert_eq!(body["error"]["status"], 409);

    daemon.shutdown().await;
}

/// A malformed tenant header is rejected before the scan starts.
#[tokio::test]
async fn test_e2e_invalid_tenant_header() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 1)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let mut req = request(Method::POST, "/api/scans", None, None);
    req.headers_mut()
        .insert("x-tenant-id", "acme".parse().expect("valid header value"));
    let (code, _) = call(&app, req).await;

    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(
        !daemon.state().orchestrator.is_running(),
        "no job may start on a rejected request"
    );
    assert!(daemon.state().orchestrator.status().job_id.is_none());

    daemon.shutdown().await;
}

/// Scan triggered with a tenant records it in the status.
#[tokio::test]
async fn test_e2e_scan_records_tenant() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Azure, 1)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let (code, _) = call(&app, request(Method::POST, "/api/scans", Some(42), None)).await;
    let status = wait_for_completion(&app).await;

    assert_eq!(code, StatusCode::ACCEPTED);
    assert_eq!(status["tenant"], 42);

    daemon.shutdown().await;
}
