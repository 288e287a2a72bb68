use chrono::{Duration, Utc};

use warden_core::auth::{TokenCodec, TokenError};

fn codec() -> TokenCodec {
    TokenCodec::new("test-secret-key", Duration::minutes(15))
}

#[test]
fn test_issue_and_verify_round_trip() {
    let codec = codec();
    let token = codec.issue(42).expect("Failed to issue token");

    let claims = codec.verify(&token).expect("Token should verify");
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.user_id(), Some(42));
    assert_eq!(claims.exp - claims.iat, 15 * 60);
    assert!(!claims.jti.is_empty());
}

#[test]
fn test_each_token_has_unique_jti() {
    let codec = codec();
    let a = codec.verify(&codec.issue(1).unwrap()).unwrap();
    let b = codec.verify(&codec.issue(1).unwrap()).unwrap();
    assert_ne!(a.jti, b.jti, "jti should be unique per token");
}

#[test]
fn test_expiry_follows_supplied_clock() {
    let codec = codec();
    let issued_at = Utc::now() - Duration::hours(1);
    let token = codec.issue_at(7, issued_at).unwrap();

    assert_eq!(codec.verify(&token), Err(TokenError::Expired));
    assert!(
        codec
            .verify_at(&token, issued_at + Duration::minutes(14))
            .is_ok(),
        "Token should be valid inside its lifetime"
    );
    assert_eq!(
        codec.verify_at(&token, issued_at + Duration::minutes(15)),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_wrong_secret_is_invalid_signature() {
    let token = codec().issue(1).unwrap();
    let other = TokenCodec::new("another-secret", Duration::minutes(15));

    assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn test_garbage_is_malformed_not_panic() {
    let codec = codec();
    for input in ["", "not-a-jwt", "a.b.c", "...."] {
        assert_eq!(
            codec.verify(input),
            Err(TokenError::Malformed),
            "input {input:?} should be malformed"
        );
        assert!(codec.decode(input).is_none());
    }
}

#[test]
fn test_tampered_payload_is_rejected() {
    let codec = codec();
    let token = codec.issue(1).unwrap();
    let mut parts: Vec<&str> = token.split('.').collect();
    let forged = codec.issue(2).unwrap();
    let forged_payload = forged.split('.').nth(1).unwrap();
    parts[1] = forged_payload;

    assert_eq!(
        codec.verify(&parts.join(".")),
        Err(TokenError::InvalidSignature)
    );
}
