use crate::api::{extract::ClientMeta, response::ApiResponse};
use crate::auth::Principal;
use crate::domain::guest_code::GuestCode;
use crate::errors::Result;
use crate::services::{
    guest_codes::{IssueGuestCode, VerifiedGuest},
    Services,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub code: Option<String>,
}

/// GET /api/guest-codes
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<GuestCode>>> {
    Ok(ApiResponse::ok(services.guest_codes.list(&principal).await?))
}

/// POST /api/guest-codes
pub async fn issue(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<IssueGuestCode>,
) -> Result<ApiResponse<GuestCode>> {
    let code = services.guest_codes.issue(&principal, input).await?;
    Ok(ApiResponse::created(code))
}

/// POST /api/guest-codes/verify
pub async fn verify(
    State(services): State<Services>,
    principal: Principal,
    ClientMeta(meta): ClientMeta,
    Json(req): Json<VerifyRequest>,
) -> Result<ApiResponse<VerifiedGuest>> {
    let guest = services.guest_codes.verify(&principal, req.code, meta).await?;
    Ok(ApiResponse::ok(guest))
}

/// PUT /api/guest-codes/:id/revoke
pub async fn revoke(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<GuestCode>> {
    let code = services.guest_codes.revoke(&principal, id).await?;
    Ok(ApiResponse::ok(code))
}
