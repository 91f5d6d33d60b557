//! HTTP API.
//!
//! A thin axum surface over the engine; handlers hold no state of their own.
//!
//! | route | handler |
//! |---|---|
//! | `POST /api/scans` | [`scans::start`] |
//! | `GET /api/scans/status` | [`scans::status`] |
//! | `POST /api/scans/cancel` | [`scans::cancel`] |
//! | `GET /api/events` | [`events::subscribe`] (SSE) |
//! | `GET /api/resources` | [`resources::list`] |
//! | `GET /api/providers` | [`providers::list`] |
//! | `PUT /api/providers/{id}` | [`providers::connect`] |
//! | `DELETE /api/providers/{id}` | [`providers::disconnect`] |
//! | `GET /health` | [`health`] |

pub mod error;
pub mod events;
pub mod providers;
pub mod resources;
pub mod scans;
pub mod tenant;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;

use skywatch_broadcast::HubHandle;
use skywatch_core::config::ServerConfig;
use skywatch_inventory::{ProviderRegistry, ResourceStore, ScanOrchestrator};

pub use error::ApiError;
pub use tenant::Tenant;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ScanOrchestrator>,
    pub registry: Arc<ProviderRegistry>,
    pub store: Arc<ResourceStore>,
    pub hub: HubHandle,
    pub sse_keep_alive: Duration,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        server: &ServerConfig,
        orchestrator: Arc<ScanOrchestrator>,
        registry: Arc<ProviderRegistry>,
        store: Arc<ResourceStore>,
        hub: HubHandle,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            store,
            hub,
            sse_keep_alive: Duration::from_secs(server.sse_keep_alive_secs),
            default_page_size: server.default_page_size,
            max_page_size: server.max_page_size,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/scans", post(scans::start))
        .route("/api/scans/status", get(scans::status))
        .route("/api/scans/cancel", post(scans::cancel))
        .route("/api/events", get(events::subscribe))
        .route("/api/resources", get(resources::list))
        .route("/api/providers", get(providers::list))
        .route(
            "/api/providers/{id}",
            put(providers::connect).delete(providers::disconnect),
        )
        .route("/health", get(health))
        .with_state(state)
}

/// `GET /health`: 503 when any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = crate::health::report(
        state.started_at.elapsed().as_secs(),
        state.hub.is_closed(),
        state.hub.stats(),
        &state.orchestrator.status(),
        &state.registry.list(),
    );
    let code = if report.status.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(report))
}
