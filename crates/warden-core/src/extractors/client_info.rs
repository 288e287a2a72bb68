use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::security::ClientInfo;

/// Never rejects: missing headers become "unknown" markers.
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_headers(&parts.headers))
    }
}
