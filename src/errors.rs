use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Token validation failed: {0}")]
    TokenValidation(String),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Not authorized to access this route")]
    Unauthorized,

    // Authorization errors
    #[error("{0}")]
    Forbidden(String),

    // Lookup and uniqueness
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),

    // Input and state-machine errors
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InvalidTransition(String),

    // Guest code lifecycle
    #[error("Code has expired")]
    GuestCodeExpired,
    #[error("Unable to generate unique code after {0} attempts")]
    GenerationExhausted(u32),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Cryptographic(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            ErrorKind::InvalidToken => AppError::TokenValidation("Invalid token".to_string()),
            _ => AppError::TokenValidation(err.to_string()),
        }
    }
}

impl AppError {
    /// HTTP status and client-facing message for this error.
    ///
    /// Storage, configuration and other server-side failures are logged and
    /// reported with a generic message.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Database(_) | AppError::DatabaseMigration(_) => {
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                )
            }
            AppError::Redis(_) => {
                tracing::error!("Redis error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                )
            }
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::TokenGeneration(_) => {
                tracing::error!("Token generation error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                )
            }
            AppError::TokenValidation(_) => {
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            }
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::GuestCodeExpired => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::GenerationExhausted(_) => {
                tracing::warn!("Guest code generation exhausted: {}", self);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::Configuration(_) | AppError::Cryptographic(_) | AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                )
            }
        }
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
