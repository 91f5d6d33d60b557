//! Live subscription over SSE: greeting, ordered progress, tenant targeting.

use std::time::Duration;

use axum::http::Method;

use skywatch_core::ProviderId;
use skywatch_daemon::daemon::Daemon;

use crate::helpers::api::*;
use crate::helpers::config::*;
use crate::helpers::sse::SseClient;

/// First frame on every stream is `connected`.
#[tokio::test]
async fn test_e2e_stream_starts_with_connected() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();

    let mut client = SseClient::connect(&app, Some(3)).await;
    let greeting = client.expect_frame().await;

    assert_eq!(greeting.event, "connected");
    assert_eq!(greeting.data["payload"]["tenantId"], 3);
    assert!(
        greeting.data["payload"]["subscriberId"].is_string(),
        "greeting must carry the subscriber id"
    );

    daemon.shutdown().await;
}

/// started -> progress (monotonic, ends at 100) -> completed, in order.
#[tokio::test]
async fn test_e2e_progress_frames_are_ordered() {
    // Given
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 2)
        .provider(ProviderId::Gcp, 2)
        .provider(ProviderId::Azure, 2)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    let mut client = SseClient::connect(&app, None).await;
    assert_eq!(client.expect_frame().await.event, "connected");

    // When
    post(&app, "/api/scans").await;
    let frames = client.frames_until("scan_completed").await;

    // Then
    let kinds: Vec<&str> = frames.iter().map(|f| f.event.as_str()).collect();
    assert_eq!(kinds.first(), Some(&"scan_started"), "got: {:?}", kinds);
    assert_eq!(kinds.last(), Some(&"scan_completed"));

    let progress: Vec<u64> = frames
        .iter()
        .filter(|f| f.event == "scan_progress")
        .filter_map(|f| f.data["payload"]["progress"].as_u64())
        .collect();
    assert_eq!(progress, vec![33, 66, 100]);

    let ids: Vec<u64> = frames
        .iter()
        .filter_map(|f| f.id.parse().ok())
        .collect();
    assert!(
        ids.windows(2).all(|w| w[1] > w[0]),
        "sequence ids must increase: {:?}",
        ids
    );

    let completed = &frames[frames.len() - 1].data["payload"];
    assert_eq!(completed["numResources"], 6);
    assert_eq!(completed["running"], false);

    daemon.shutdown().await;
}

/// Events of a tenant's scan never reach another tenant's stream.
#[tokio::test]
async fn test_e2e_scan_events_target_triggering_tenant() {
    let (config, _dir) = TestConfigBuilder::new()
        .provider(ProviderId::Aws, 1)
        .build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    let mut owner = SseClient::connect(&app, Some(7)).await;
    let mut other = SseClient::connect(&app, Some(8)).await;
    owner.expect_frame().await;
    other.expect_frame().await;

    call(&app, request(Method::POST, "/api/scans", Some(7), None)).await;
    let frames = owner.frames_until("scan_completed").await;

    assert!(frames.len() >= 3, "owner should see the whole job");
    assert!(
        other.stays_quiet(Duration::from_millis(200)).await,
        "tenant 8 must not see tenant 7's scan"
    );

    daemon.shutdown().await;
}

/// Shutdown ends open streams.
#[tokio::test]
async fn test_e2e_shutdown_closes_streams() {
    let (config, _dir) = TestConfigBuilder::new().build();
    let mut daemon = Daemon::build_from_config(config)
        .await
        .expect("daemon should build");
    let app = daemon.router();
    let mut client = SseClient::connect(&app, None).await;
    client.expect_frame().await;

    daemon.shutdown().await;

    let end = tokio::time::timeout(WAIT, client.next_frame())
        .await
        .expect("stream should end in time");
    assert!(end.is_none(), "no frames after shutdown, got {:?}", end);
}
