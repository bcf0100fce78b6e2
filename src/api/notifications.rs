use crate::api::response::ApiResponse;
use crate::auth::Principal;
use crate::domain::notification::Notification;
use crate::errors::Result;
use crate::services::{notifications::NewNotification, Services};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Modified {
    pub modified_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// GET /api/notifications
pub async fn list(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Vec<Notification>>> {
    Ok(ApiResponse::ok(services.notifier.list(&principal).await?))
}

/// POST /api/notifications
pub async fn send(
    State(services): State<Services>,
    principal: Principal,
    Json(input): Json<NewNotification>,
) -> Result<ApiResponse<Notification>> {
    let notification = services.notifier.send(&principal, input).await?;
    Ok(ApiResponse::created(notification))
}

/// PUT /api/notifications/:id/read
pub async fn mark_read(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Notification>> {
    Ok(ApiResponse::ok(services.notifier.mark_read(&principal, id).await?))
}

/// PUT /api/notifications/mark-all-read
pub async fn mark_all_read(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<Modified>> {
    let modified_count = services.notifier.mark_all_read(&principal).await?;
    Ok(ApiResponse::ok(Modified { modified_count }).with_message(format!(
        "{} notifications marked as read",
        modified_count
    )))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(services): State<Services>,
    principal: Principal,
) -> Result<ApiResponse<UnreadCount>> {
    let count = services.notifier.unread_count(&principal).await?;
    Ok(ApiResponse::ok(UnreadCount { count }))
}

/// DELETE /api/notifications/:id
pub async fn delete(
    State(services): State<Services>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    services.notifier.delete(&principal, id).await?;
    Ok(ApiResponse::message("Notification deleted"))
}
