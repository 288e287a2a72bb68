use chrono::Duration;

use warden_core::auth::{RefreshTokenStore, SessionRegistry};
use warden_core::testing::memory_db;

#[tokio::test]
async fn test_list_sessions_hides_secrets() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);

    let issued = store
        .issue(
            1,
            Some("Chrome on Windows (desktop)".into()),
            Some("10.0.0.1".into()),
            Duration::days(30),
        )
        .await
        .unwrap();

    let sessions = registry.list_sessions(1).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, issued.id);
    assert_eq!(sessions[0].device_info.as_deref(), Some("Chrome on Windows (desktop)"));

    let json = serde_json::to_string(&sessions).unwrap();
    assert!(!json.contains(&issued.secret));
    assert!(!json.contains("token_hash"));
}

#[tokio::test]
async fn test_list_sessions_skips_revoked_and_expired() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);

    let live = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let revoked = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    store.issue(1, None, None, Duration::seconds(-10)).await.unwrap();
    store.revoke(revoked.id).await.unwrap();

    let ids: Vec<i32> = registry
        .list_sessions(1)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![live.id]);
}

#[tokio::test]
async fn test_revoke_own_session() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);
    let issued = store.issue(1, None, None, Duration::days(30)).await.unwrap();

    assert!(registry.revoke_session(1, issued.id).await.unwrap());
    assert!(!store.is_active(&issued.secret).await.unwrap());
    assert!(
        !registry.revoke_session(1, issued.id).await.unwrap(),
        "Already revoked"
    );
}

#[tokio::test]
async fn test_cannot_revoke_someone_elses_session() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);
    let victim = store.issue(1, None, None, Duration::days(30)).await.unwrap();

    let not_yours = registry.revoke_session(2, victim.id).await.unwrap();
    let missing = registry.revoke_session(2, 424242).await.unwrap();

    assert!(!not_yours);
    assert_eq!(not_yours, missing, "Foreign and missing look identical");
    assert!(store.is_active(&victim.secret).await.unwrap());
}

#[tokio::test]
async fn test_revoke_expired_session_is_noop() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);
    let expired = store.issue(1, None, None, Duration::seconds(-10)).await.unwrap();

    assert!(!registry.revoke_session(1, expired.id).await.unwrap());
}

#[tokio::test]
async fn test_revoke_other_sessions_keeps_current() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);

    let current = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let laptop = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let phone = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let other_user = store.issue(2, None, None, Duration::days(30)).await.unwrap();

    assert_eq!(registry.revoke_other_sessions(1, &current.secret).await.unwrap(), 2);
    assert!(store.is_active(&current.secret).await.unwrap());
    assert!(!store.is_active(&laptop.secret).await.unwrap());
    assert!(!store.is_active(&phone.secret).await.unwrap());
    assert!(store.is_active(&other_user.secret).await.unwrap());
}

#[tokio::test]
async fn test_revoke_other_sessions_skips_expired() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);

    let current = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    store.issue(1, None, None, Duration::hours(-1)).await.unwrap();

    assert_eq!(registry.revoke_other_sessions(1, &current.secret).await.unwrap(), 0);
    assert!(store.is_active(&current.secret).await.unwrap());
}

#[tokio::test]
async fn test_revoke_all() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let registry = SessionRegistry::new(db);
    store.issue(1, None, None, Duration::days(30)).await.unwrap();
    store.issue(1, None, None, Duration::days(30)).await.unwrap();

    assert_eq!(registry.revoke_all(1).await.unwrap(), 2);
    assert!(registry.list_sessions(1).await.unwrap().is_empty());
    assert_eq!(registry.revoke_all(1).await.unwrap(), 0);
}
