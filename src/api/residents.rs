use crate::api::response::ApiResponse;
use crate::auth::Principal;
use crate::domain::{
    resident::{Resident, ResidentFilter, ResidentWithOwner},
    user::AccountStatus,
};
use crate::errors::Result;
use crate::services::{directory::CreateResident, Services};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ResidentQuery {
    pub block: Option<String>,
    pub status: Option<AccountStatus>,
}

/// GET /api/residents?block&status
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
    Query(query): Query<ResidentQuery>,
) -> Result<ApiResponse<Vec<ResidentWithOwner>>> {
    let filter = ResidentFilter {
        block: query.block,
        status: query.status,
    };
    let residents = services.directory.list_residents(&principal, filter).await?;
    Ok(ApiResponse::ok(residents))
}

/// POST /api/residents
pub async fn create(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<CreateResident>,
) -> Result<ApiResponse<Resident>> {
    let resident = services.directory.create_resident(&principal, input).await?;
    Ok(ApiResponse::created(resident))
}
