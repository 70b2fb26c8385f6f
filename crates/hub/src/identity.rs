//! Identity — typed viewer identity extracted at the HTTP boundary.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use bridge::eve::TenantId;

use crate::error::ApiError;

/// Tenant the connection defaults to when no header is supplied.
/// The default lives here, at the boundary — never inside the core.
pub const DEFAULT_TENANT: TenantId = TenantId(1);

/// Header carrying the caller's tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Caller identity, resolved once per request and passed by
/// parameter from here on.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub tenant: TenantId,
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(TENANT_HEADER) {
            None => Ok(Identity { tenant: DEFAULT_TENANT }),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|id| *id > 0)
                .map(|id| Identity { tenant: TenantId(id) })
                .ok_or_else(|| {
                    ApiError::InvalidRequest(format!(
                        "{} must be a positive numeric tenant id",
                        TENANT_HEADER
                    ))
                }),
        }
    }
}
