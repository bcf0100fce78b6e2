// The authenticated caller, resolved from a bearer token

use crate::api::AppState;
use crate::auth::jwt::JwtManager;
use crate::domain::user::Role;
use crate::errors::{AppError, Result};
use crate::store::Store;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

/// Identity and role of the caller for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate `token` and re-load its subject so that role changes and
/// deactivations take effect before the token expires.
pub async fn authenticate(jwt: &JwtManager, store: &dyn Store, token: &str) -> Result<Principal> {
    let claims = jwt.validate_access_token(token)?;
    let user_id = claims.user_id()?;

    let user = store.find_user(user_id).await?.ok_or_else(|| {
        tracing::warn!("Token presented for unknown user {}", user_id);
        AppError::Unauthorized
    })?;

    if !user.is_active() {
        tracing::warn!("Token presented for inactive user {}", user_id);
        return Err(AppError::Unauthorized);
    }

    Ok(Principal::new(user.id, user.role))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        authenticate(&state.jwt, state.store.as_ref(), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
