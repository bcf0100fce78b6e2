// JSON envelope shared by every endpoint: `{ success, data?, message?, pagination? }`

use crate::services::{Paginated, Pagination};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
            status: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: Some(StatusCode::CREATED),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> From<Paginated<T>> for ApiResponse<Vec<T>> {
    fn from(page: Paginated<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::ok(page.items)
        }
    }
}

impl ApiResponse<()> {
    /// Success with only a message, for operations that return nothing.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
            status: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::PageRequest;
    use serde_json::json;

    #[test]
    fn test_envelope_shapes() {
        let body = serde_json::to_value(ApiResponse::ok(json!({"a": 1}))).unwrap();
        assert_eq!(body, json!({"success": true, "data": {"a": 1}}));

        let body = serde_json::to_value(ApiResponse::message("User deleted successfully")).unwrap();
        assert_eq!(
            body,
            json!({"success": true, "message": "User deleted successfully"})
        );

        let page = PageRequest::new(Some(2), Some(2)).paginate(vec![1, 2], 5);
        let body = serde_json::to_value(ApiResponse::from(page)).unwrap();
        assert_eq!(body["pagination"], json!({"current": 2, "pages": 3, "total": 5}));
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::created(json!({})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
