use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::TokenCodec;
use crate::error::WardenError;

/// Extractor that verifies the bearer access token and yields its user id.
///
/// Expects a [`TokenCodec`] in the request extensions (e.g. via
/// `axum::Extension(codec)`).
///
/// ```rust,ignore
/// async fn me(AuthUser(user_id): AuthUser) -> impl IntoResponse {
///     // user_id is the authenticated user's ID
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i32);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = WardenError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| WardenError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            WardenError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        let codec = parts
            .extensions
            .get::<TokenCodec>()
            .ok_or_else(|| WardenError::Internal("Token codec not found in request".to_string()))?;

        let claims = codec.verify(token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| WardenError::Unauthorized("Invalid user ID in token".to_string()))?;

        Ok(AuthUser(user_id))
    }
}
