use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use skywatch_core::TenantId;

use super::ApiError;

/// Request header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant context of a request; tenant 0 when the header is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub TenantId);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(TENANT_HEADER) else {
            return Ok(Self(TenantId::ALL));
        };
        value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|id| Self(TenantId(id)))
            .ok_or_else(|| ApiError::bad_request(format!("invalid {} header", TENANT_HEADER)))
    }
}
