//! Scan trigger, status and cancel endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use skywatch_inventory::ScanStatus;

use super::{ApiError, AppState, Tenant};

/// `POST /api/scans`
///
/// 202 with the new job id when a job starts; 200 with the in-flight status
/// when one is already running.
pub async fn start(State(state): State<AppState>, Tenant(tenant): Tenant) -> Response {
    let ticket = state.orchestrator.start(tenant);
    if ticket.accepted {
        let body = json!({
            "jobId": ticket.status.job_id,
            "status": "started",
        });
        (StatusCode::ACCEPTED, Json(body)).into_response()
    } else {
        (StatusCode::OK, Json(ticket.status)).into_response()
    }
}

/// `GET /api/scans/status`
pub async fn status(State(state): State<AppState>) -> Json<ScanStatus> {
    Json(state.orchestrator.status())
}

/// `POST /api/scans/cancel`
pub async fn cancel(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.orchestrator.cancel() {
        return Err(ApiError::conflict("no scan is running"));
    }
    let body = json!({
        "jobId": state.orchestrator.status().job_id,
        "status": "cancelling",
    });
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}
