//! Provider connect/disconnect endpoints.
//!
//! Connection changes are announced to subscribers of the calling tenant
//! as `provider_connected` / `provider_disconnected` events.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use tracing::warn;

use skywatch_core::{BroadcastEvent, Credentials, ProviderAccount, ProviderId, TenantId};

use super::{ApiError, AppState, Tenant};

/// Body of `PUT /api/providers/{id}`.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub credentials: Credentials,
}

/// `GET /api/providers`
pub async fn list(State(state): State<AppState>) -> Json<Vec<ProviderAccount>> {
    Json(state.registry.list())
}

/// `PUT /api/providers/{id}`
pub async fn connect(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ProviderAccount>, ApiError> {
    let provider: ProviderId = id.parse()?;
    let account = state.registry.set_connected(provider, request.credentials)?;
    announce(&state, provider, true, tenant);
    Ok(Json(account))
}

/// `DELETE /api/providers/{id}`
pub async fn disconnect(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    Path(id): Path<String>,
) -> Result<Json<ProviderAccount>, ApiError> {
    let provider: ProviderId = id.parse()?;
    let account = state.registry.set_disconnected(provider)?;
    announce(&state, provider, false, tenant);
    Ok(Json(account))
}

fn announce(state: &AppState, provider: ProviderId, connected: bool, tenant: TenantId) {
    let event = BroadcastEvent::provider_changed(provider, connected).for_tenant(tenant);
    if let Err(e) = state.hub.try_publish(event) {
        warn!(provider = %provider, error = %e, "provider change not broadcast");
    }
}
