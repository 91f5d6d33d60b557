//! Resource listing: filters and paging over the published snapshot.

use axum::http::StatusCode;

use skywatch_core::ProviderId;
use skywatch_daemon::daemon::Daemon;

use crate::helpers::api::*;
use crate::helpers::config::*;

async fn scanned_daemon() -> (Daemon, tempfile::TempDir) {
    let (config, dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 5)
        .provider(ProviderId::Azure, 2)
        .page_sizes(4, 6)
        .build();
    let daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    post(&app, "/api/scans").await;
    wait_for_completion(&app).await;
    (daemon, dir)
}

/// Empty store before the first scan.
#[tokio::test]
async fn test_e2e_listing_before_scan_is_empty() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 5)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");

    let (code, body) = get(&daemon.router(), "/api/resources").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
    assert!(body["jobId"].is_null());

    daemon.shutdown().await;
}

/// Default page size applies; the last page is short.
#[tokio::test]
async fn test_e2e_listing_pages() {
    let (mut daemon, _dir) = scanned_daemon().await;
    let app = daemon.router();

    let (_, first) = get(&app, "/api/resources").await;
    let (_, second) = get(&app, "/api/resources?page=2").await;

    assert_eq!(first["total"], 7);
    assert_eq!(first["page"], 1);
    assert_eq!(first["pageSize"], 4);
    assert_eq!(first["items"].as_array().map(Vec::len), Some(4));
    assert_eq!(second["items"].as_array().map(Vec::len), Some(3));
    assert!(first["jobId"].is_string(), "listing names its snapshot");

    daemon.shutdown().await;
}

/// pageSize above the maximum is clamped; page past the end is empty.
#[tokio::test]
async fn test_e2e_listing_clamps_page_size() {
    let (mut daemon, _dir) = scanned_daemon().await;
    let app = daemon.router();

    let (_, big) = get(&app, "/api/resources?pageSize=1000").await;
    let (_, beyond) = get(&app, "/api/resources?page=9").await;

    assert_eq!(big["pageSize"], 6);
    assert_eq!(big["items"].as_array().map(Vec::len), Some(6));
    assert_eq!(beyond["total"], 7);
    assert_eq!(beyond["items"].as_array().map(Vec::len), Some(0));

    daemon.shutdown().await;
}

/// provider, type and region filters combine.
#[tokio::test]
async fn test_e2e_listing_filters() {
    let (mut daemon, _dir) = scanned_daemon().await;
    let app = daemon.router();

    let (_, azure) = get(&app, "/api/resources?provider=azure").await;
    let (_, buckets) = get(&app, "/api/resources?provider=aws&type=bucket").await;
    let (_, eu) = get(&app, "/api/resources?region=eu-west-1").await;

    assert_eq!(azure["total"], 2);
    // aws-1, aws-3
    assert_eq!(buckets["total"], 2);
    // index 0 and 1 of each provider
    assert_eq!(eu["total"], 4);

    daemon.shutdown().await;
}

/// Unknown provider filter -> 400.
#[tokio::test]
async fn test_e2e_listing_rejects_unknown_provider_filter() {
    let (mut daemon, _dir) = scanned_daemon().await;

    let (code, body) = get(&daemon.router(), "/api/resources?provider=oracle").await;

    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("oracle")),
        "got: {}",
        body
    );

    daemon.shutdown().await;
}
