//! Paged, filtered resource listing from the published snapshot.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use skywatch_core::{ProviderId, Resource};
use skywatch_inventory::ResourceFilter;

use super::{ApiError, AppState};

/// Query string of `GET /api/resources`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub provider: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub region: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// One page of resources.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListResponse {
    pub items: Vec<Resource>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    /// Job that produced the snapshot; absent before the first scan.
    pub job_id: Option<String>,
}

/// `GET /api/resources?provider=&type=&region=&page=&pageSize=`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> Result<Json<ResourceListResponse>, ApiError> {
    let provider = query
        .provider
        .as_deref()
        .map(str::parse::<ProviderId>)
        .transpose()
        .map_err(|e| ApiError::bad_request(format!("invalid provider filter: {}", e)))?;

    let filter = ResourceFilter {
        provider,
        resource_type: query.resource_type,
        region: query.region,
    };
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(state.default_page_size)
        .clamp(1, state.max_page_size.max(1));
    let offset = (page - 1).saturating_mul(page_size);

    let listed = state.store.list(&filter, page_size, offset);
    Ok(Json(ResourceListResponse {
        items: listed.items,
        total: listed.total,
        page,
        page_size,
        job_id: listed.job_id,
    }))
}
