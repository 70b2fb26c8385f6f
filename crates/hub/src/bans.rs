//! Bans — the ban/unban control-plane routes.
//!
//! Decisions are not stored here: they are published, ack-confirmed,
//! on the ban subjects for enforcement points to consume.

use std::net::IpAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use bridge::broker::{BAN_SUBJECT, UNBAN_SUBJECT};

use crate::error::{ApiError, ApiResult};
use crate::identity::Identity;
use crate::state::AppState;

/// Ban request body
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    /// Address to ban (IPv4 or IPv6 literal)
    pub ip: String,
    /// Operator-supplied reason
    #[serde(default)]
    pub reason: String,
}

fn validate_ip(ip: &str) -> Result<IpAddr, ApiError> {
    ip.trim()
        .parse::<IpAddr>()
        .map_err(|_| ApiError::InvalidRequest(format!("'{}' is not a valid IP address", ip)))
}

/// POST /api/bans — publish an ack-confirmed ban action
pub async fn ban_ip(
    State(state): State<AppState>,
    identity: Identity,
    Json(body): Json<BanRequest>,
) -> ApiResult<impl IntoResponse> {
    let ip = validate_ip(&body.ip)?;

    let action = json!({
        "action": "ban",
        "ip": ip.to_string(),
        "tenant_id": identity.tenant.0,
        "reason": body.reason,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let payload = serde_json::to_vec(&action)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    // Control-plane publish waits for the broker acknowledgement: a
    // lost ban must fail loudly, not silently.
    state
        .broker
        .publish_acked(BAN_SUBJECT.to_string(), payload.into())
        .await?;

    info!(ip = %ip, tenant = identity.tenant.0, "Ban action published");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "ban recorded", "ip": ip.to_string() })),
    ))
}

/// DELETE /api/bans/{ip} — publish an ack-confirmed unban action
pub async fn unban_ip(
    State(state): State<AppState>,
    identity: Identity,
    Path(ip): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ip = validate_ip(&ip)?;

    let action = json!({
        "action": "unban",
        "ip": ip.to_string(),
        "tenant_id": identity.tenant.0,
        "timestamp": Utc::now().to_rfc3339(),
    });
    let payload = serde_json::to_vec(&action)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .broker
        .publish_acked(UNBAN_SUBJECT.to_string(), payload.into())
        .await?;

    info!(ip = %ip, tenant = identity.tenant.0, "Unban action published");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "unban recorded", "ip": ip.to_string() })),
    ))
}
