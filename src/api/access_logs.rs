use crate::api::{extract::ClientMeta, response::ApiResponse};
use crate::auth::Principal;
use crate::domain::access_log::{
    AccessLog, AccessLogEntry, AccessLogFilter, AccessMethod, AccessPoint, AccessResult,
};
use crate::errors::Result;
use crate::services::{
    access_log::{AccessStatistics, ManualAccessInput},
    PageRequest, Services,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub result: Option<AccessResult>,
    pub method: Option<AccessMethod>,
    pub access_point: Option<AccessPoint>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// GET /api/access-logs
pub async fn query(
    State(services): State<Services>,
    principal: Principal,
    Query(query): Query<LogQuery>,
) -> Result<ApiResponse<Vec<AccessLogEntry>>> {
    let filter = AccessLogFilter {
        start: query.start_date,
        end: query.end_date,
        result: query.result,
        method: query.method,
        access_point: query.access_point,
        user_id: query.user_id,
    };
    let page = PageRequest::new(query.page, query.limit);
    Ok(services.access_log.query(&principal, filter, page).await?.into())
}

/// POST /api/access-logs
pub async fn record(
    State(services): State<Services>,
    principal: Principal,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<ManualAccessInput>,
) -> Result<ApiResponse<AccessLog>> {
    let log = services
        .access_log
        .record_manual(&principal, input, meta)
        .await?;
    Ok(ApiResponse::created(log))
}

/// GET /api/access-logs/statistics?startDate&endDate
pub async fn statistics(
    State(services): State<Services>,
    principal: Principal,
    Query(query): Query<StatisticsQuery>,
) -> Result<ApiResponse<AccessStatistics>> {
    let stats = services
        .access_log
        .statistics(&principal, query.start_date, query.end_date)
        .await?;
    Ok(ApiResponse::ok(stats))
}
