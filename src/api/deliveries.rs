use crate::api::response::ApiResponse;
use crate::auth::Principal;
use crate::domain::delivery::Delivery;
use crate::errors::Result;
use crate::services::{deliveries::AuthorizeDelivery, Services};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// GET /api/deliveries
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<Delivery>>> {
    Ok(ApiResponse::ok(services.deliveries.list(&principal).await?))
}

/// POST /api/deliveries
pub async fn authorize(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<AuthorizeDelivery>,
) -> Result<ApiResponse<Delivery>> {
    let delivery = services.deliveries.authorize(&principal, input).await?;
    Ok(ApiResponse::created(delivery))
}

/// PUT /api/deliveries/:id/status
pub async fn set_status(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> Result<ApiResponse<Delivery>> {
    let delivery = services
        .deliveries
        .set_status(&principal, id, req.status.as_deref())
        .await?;
    Ok(ApiResponse::ok(delivery))
}

/// GET /api/deliveries/pending
pub async fn pending(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<Delivery>>> {
    Ok(ApiResponse::ok(services.deliveries.pending(&principal).await?))
}
