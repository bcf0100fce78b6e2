use crate::api::{extract::ClientMeta, response::ApiResponse};
use crate::auth::Principal;
use crate::domain::visit::{GuestVisit, VisitFilter, VisitStatus};
use crate::errors::Result;
use crate::services::{visits::CreateVisit, PageRequest, Services};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitQuery {
    pub resident_id: Option<Uuid>,
    pub status: Option<VisitStatus>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

/// GET /api/guest-visits?residentId&status&limit&page
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
    Query(query): Query<VisitQuery>,
) -> Result<ApiResponse<Vec<GuestVisit>>> {
    let filter = VisitFilter {
        resident_id: query.resident_id,
        status: query.status,
    };
    let page = PageRequest::new(query.page, query.limit);
    let visits = services.visits.list(&principal, filter, page).await?;
    Ok(visits.into())
}

/// GET /api/guest-visits/active
pub async fn active(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<GuestVisit>>> {
    Ok(ApiResponse::ok(services.visits.active(&principal).await?))
}

/// GET /api/guest-visits/:id
pub async fn get(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<GuestVisit>> {
    Ok(ApiResponse::ok(services.visits.get(&principal, id).await?))
}

/// POST /api/guest-visits
pub async fn create(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<CreateVisit>,
) -> Result<ApiResponse<GuestVisit>> {
    let visit = services.visits.create(&principal, input).await?;
    Ok(ApiResponse::created(visit))
}

/// PUT /api/guest-visits/:id/checkin
pub async fn check_in(
    State(services): State<Services>,
    principal: Principal,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<GuestVisit>> {
    let visit = services.visits.check_in(&principal, id, meta).await?;
    Ok(ApiResponse::ok(visit))
}

/// PUT /api/guest-visits/:id/checkout
pub async fn check_out(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<GuestVisit>> {
    Ok(ApiResponse::ok(services.visits.check_out(&principal, id).await?))
}

/// PUT /api/guest-visits/:id/cancel
pub async fn cancel(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<GuestVisit>> {
    Ok(ApiResponse::ok(services.visits.cancel(&principal, id).await?))
}
