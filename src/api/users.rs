// Identity management endpoints (admin tier, plus self-service profile)

use crate::api::response::ApiResponse;
use crate::auth::Principal;
use crate::domain::user::User;
use crate::errors::Result;
use crate::services::{
    directory::{CreateUser, UpdateProfile, UpdateUser, UserDetail, UserListing},
    Services,
};
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

/// GET /api/users
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<UserListing>>> {
    Ok(ApiResponse::ok(services.directory.list_users(&principal).await?))
}

/// POST /api/users
pub async fn create(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<CreateUser>,
) -> Result<ApiResponse<User>> {
    let user = services.directory.create_user(&principal, input).await?;
    Ok(ApiResponse::created(user))
}

/// GET /api/users/:id
pub async fn get(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<UserDetail>> {
    Ok(ApiResponse::ok(services.directory.get_user(&principal, id).await?))
}

/// PUT /api/users/:id
pub async fn update(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUser>,
) -> Result<ApiResponse<User>> {
    let user = services.directory.update_user(&principal, id, input).await?;
    Ok(ApiResponse::ok(user))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<UpdateProfile>,
) -> Result<ApiResponse<User>> {
    let user = services.directory.update_profile(&principal, input).await?;
    Ok(ApiResponse::ok(user))
}

/// DELETE /api/users/:id
pub async fn delete(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    services.directory.delete_user(&principal, id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}
