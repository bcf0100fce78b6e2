// Authentication endpoints

use crate::api::response::ApiResponse;
use crate::auth::Principal;
use crate::errors::Result;
use crate::services::{
    directory::{LoginRequest, LoginResponse, UserDetail},
    Services,
};
use axum::{extract::State, Json};

/// POST /api/auth/login
///
/// Exchange email and password for a bearer token.
pub async fn login(
    State(services): State<Services>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>> {
    let response = services.directory.login(req).await?;
    Ok(ApiResponse::ok(response))
}

/// GET /api/auth/me
#[tracing::instrument(skip(services))]
pub async fn me(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<UserDetail>> {
    Ok(ApiResponse::ok(services.directory.me(&principal).await?))
}
