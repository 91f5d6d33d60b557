//! Provider connect/disconnect over the HTTP API.

use axum::http::{Method, StatusCode};
use serde_json::json;

use skywatch_core::ProviderId;
use skywatch_daemon::daemon::Daemon;

use crate::helpers::api::*;
use crate::helpers::config::*;
use crate::helpers::sse::SseClient;

/// Listing shows every known provider; credentials never appear.
#[tokio::test]
async fn test_e2e_provider_list_hides_credentials() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 1)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let (code, body) = get(&app, "/api/providers").await;

    assert_eq!(code, StatusCode::OK);
    let accounts = body.as_array().expect("array of accounts");
    assert_eq!(accounts.len(), 3);
    let aws = accounts
        .iter()
        .find(|a| a["id"] == "aws")
        .expect("aws listed");
    assert_eq!(aws["isConnected"], true);
    assert!(
        !body.to_string().contains("test-token"),
        "credentials leaked: {}",
        body
    );

    daemon.shutdown().await;
}

/// PUT connects, DELETE disconnects, both announce to subscribers.
#[tokio::test]
async fn test_e2e_connect_and_disconnect_round() {
    // Given
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    let mut client = SseClient::connect(&app, None).await;
    client.expect_frame().await;

    // When: connect gcp
    let body = json!({"credentials": {"service_account": "{}"}});
    let (code, account) = call(
        &app,
        request(Method::PUT, "/api/providers/gcp", None, Some(body)),
    )
    .await;

    // Then
    assert_eq!(code, StatusCode::OK);
    assert_eq!(account["id"], "gcp");
    assert_eq!(account["isConnected"], true);
    assert!(account["lastSynced"].is_null());
    let frame = client.expect_frame().await;
    assert_eq!(frame.event, "provider_connected");
    assert_eq!(frame.data["payload"]["provider"], "gcp");

    // When: disconnect gcp
    let (code, account) = call(
        &app,
        request(Method::DELETE, "/api/providers/gcp", None, None),
    )
    .await;

    // Then
    assert_eq!(code, StatusCode::OK);
    assert_eq!(account["isConnected"], false);
    assert_eq!(client.expect_frame().await.event, "provider_disconnected");

    daemon.shutdown().await;
}

/// Empty credential bundle -> 400, provider stays disconnected.
#[tokio::test]
async fn test_e2e_connect_with_empty_credentials_rejected() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let body = json!({"credentials": {}});
    let (code, error) = call(
        &app,
        request(Method::PUT, "/api/providers/azure", None, Some(body)),
    )
    .await;

    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["status"], 400);
    let account = daemon
        .state()
        .registry
        .get(ProviderId::Azure)
        .expect("azure registered");
    assert!(!account.is_connected);

    daemon.shutdown().await;
}

/// Unknown provider id -> 404 on both verbs.
#[tokio::test]
async fn test_e2e_unknown_provider_not_found() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let body = json!({"credentials": {"key": "value"}});
    let (put_code, _) = call(
        &app,
        request(Method::PUT, "/api/providers/oracle", None, Some(body)),
    )
    .await;
    let (delete_code, _) = call(
        &app,
        request(Method::DELETE, "/api/providers/oracle", None, None),
    )
    .await;

    assert_eq!(put_code, StatusCode::NOT_FOUND);
    assert_eq!(delete_code, StatusCode::NOT_FOUND);

    daemon.shutdown().await;
}

/// A scan stamps lastSynced on the providers it reached.
#[tokio::test]
async fn test_e2e_scan_sets_last_synced() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 2)
        .provider_missing_export(ProviderId::Azure)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    post(&app, "/api/scans").await;
    wait_for_completion(&app).await;
    let (_, body) = get(&app, "/api/providers").await;

    let accounts = body.as_array().expect("array of accounts");
    let by_id = |id: &str| {
        accounts
            .iter()
            .find(|a| a["id"] == id)
            .cloned()
            .expect("provider listed")
    };
    assert!(by_id("aws")["lastSynced"].is_string(), "aws was scanned");
    assert!(by_id("azure")["lastSynced"].is_null(), "azure fetch failed");
    assert!(by_id("gcp")["lastSynced"].is_null(), "gcp not connected");

    daemon.shutdown().await;
}
