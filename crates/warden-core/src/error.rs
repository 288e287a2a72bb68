use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Standard error type for the Warden engine.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests: retry in {retry_after_secs} seconds")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl WardenError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WardenError::NotFound(_) => StatusCode::NOT_FOUND,
            WardenError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WardenError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WardenError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            WardenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WardenError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            WardenError::NotFound(_) => "NOT_FOUND",
            WardenError::BadRequest(_) => "BAD_REQUEST",
            WardenError::Unauthorized(_) => "UNAUTHORIZED",
            WardenError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            WardenError::Internal(_) => "INTERNAL_ERROR",
            WardenError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Error detail for API responses.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorDetail,
}

impl axum::response::IntoResponse for WardenError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Storage details stay in the server log.
        let message = match &self {
            WardenError::Database(e) => {
                tracing::error!(error = %e, "database error while handling request");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        let body = ErrorEnvelope {
            success: false,
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let WardenError::TooManyRequests { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
