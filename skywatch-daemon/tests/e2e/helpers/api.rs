//! Router call helpers.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

/// Upper bound for any wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

#[allow(dead_code)]
pub fn request(method: Method, uri: &str, tenant: Option<u64>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant.to_string());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build")
}

/// Send one request and decode the JSON body (`Null` when empty).
#[allow(dead_code)]
pub async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, json)
}

#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, request(Method::GET, uri, None, None)).await
}

#[allow(dead_code)]
pub async fn post(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, request(Method::POST, uri, None, None)).await
}

/// Poll `GET /api/scans/status` until the job is no longer running.
#[allow(dead_code)]
pub async fn wait_for_completion(app: &Router) -> Value {
    tokio::time::timeout(WAIT, async {
        loop {
            let (_, status) = get(app, "/api/scans/status").await;
            if status["running"] == false && status["phase"] == "completed" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("scan should complete in time")
}
