use axum::{body::Body, extract::FromRequestParts, http::Request};
use chrono::{Duration, Utc};

use warden_core::WardenError;
use warden_core::auth::TokenCodec;
use warden_core::extractors::AuthUser;

fn codec() -> TokenCodec {
    TokenCodec::new("test-secret-key", Duration::minutes(15))
}

async fn extract(authorization: Option<String>, codec: Option<TokenCodec>) -> Result<AuthUser, WardenError> {
    let mut builder = Request::builder();
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    let mut req = builder.body(Body::empty()).unwrap();
    if let Some(codec) = codec {
        req.extensions_mut().insert(codec);
    }
    let (mut parts, _body) = req.into_parts();
    AuthUser::from_request_parts(&mut parts, &()).await
}

#[tokio::test]
async fn test_valid_bearer_token_extracts_user_id() {
    let codec = codec();
    let token = codec.issue(42).expect("Failed to create token");

    let result = extract(Some(format!("Bearer {token}")), Some(codec)).await;

    assert_eq!(result.unwrap(), AuthUser(42));
}

#[tokio::test]
async fn test_missing_authorization_header_fails() {
    let result = extract(None, Some(codec())).await;
    assert!(matches!(result, Err(WardenError::Unauthorized(_))));
}

#[tokio::test]
async fn test_non_bearer_scheme_fails() {
    let result = extract(Some("Basic dXNlcjpwYXNz".to_string()), Some(codec())).await;
    assert!(matches!(result, Err(WardenError::Unauthorized(_))));
}

#[tokio::test]
async fn test_expired_token_fails() {
    let codec = codec();
    let token = codec.issue_at(1, Utc::now() - Duration::hours(2)).unwrap();

    let result = extract(Some(format!("Bearer {token}")), Some(codec)).await;
    assert!(matches!(result, Err(WardenError::Unauthorized(_))));
}

#[tokio::test]
async fn test_missing_codec_is_internal_error() {
    let token = codec().issue(1).unwrap();

    let result = extract(Some(format!("Bearer {token}")), None).await;
    assert!(matches!(result, Err(WardenError::Internal(_))));
}
