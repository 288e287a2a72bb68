use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, QueryOrder};

use warden_core::auth::{PasswordHistory, RefreshTokenStore, VerificationTokens};
use warden_core::cleanup::{CleanupJob, CleanupScheduler, TableOutcome};
use warden_core::config::RetentionConfig;
use warden_core::models::{password_history, refresh_token, security_log};
use warden_core::security::{NewSecurityEvent, RateLimitStore, SecurityAction, SecurityLog};
use warden_core::testing::memory_db;

fn job(db: &sea_orm::DatabaseConnection) -> CleanupJob {
    CleanupJob::new(db.clone(), RetentionConfig::default())
}

#[tokio::test]
async fn test_refresh_token_retention() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    let now = Utc::now().naive_utc();

    let expired = store.issue(1, None, None, Duration::hours(-1)).await.unwrap();
    let live = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let revoked_long_ago = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    let revoked_recently = store.issue(1, None, None, Duration::days(30)).await.unwrap();
    store
        .revoke_at(revoked_long_ago.id, now - Duration::days(8))
        .await
        .unwrap();
    store
        .revoke_at(revoked_recently.id, now - Duration::days(6))
        .await
        .unwrap();

    let report = job(&db).run_at(now).await;
    assert_eq!(report.deleted("refresh_tokens"), Some(2));

    let remaining: Vec<i32> = refresh_token::Entity::find()
        .order_by_asc(refresh_token::Column::Id)
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(remaining, vec![live.id, revoked_recently.id]);
    assert!(!remaining.contains(&expired.id));
}

#[tokio::test]
async fn test_second_sweep_deletes_nothing() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    store.issue(1, None, None, Duration::hours(-1)).await.unwrap();
    let now = Utc::now().naive_utc();

    let first = job(&db).run_at(now).await;
    assert_eq!(first.total_deleted(), 1);
    assert!(first.is_complete());

    let second = job(&db).run_at(now).await;
    assert_eq!(second.total_deleted(), 0);
    assert_eq!(second.tables.len(), 5, "Every table is reported");
}

#[tokio::test]
async fn test_used_and_expired_single_use_tokens_are_removed() {
    let db = memory_db().await;
    let tokens = VerificationTokens::new(db.clone());

    let used = tokens
        .create_email_verification(1, Duration::hours(24))
        .await
        .unwrap();
    tokens.consume_email_verification(&used).await.unwrap();
    tokens
        .create_email_verification(2, Duration::hours(24))
        .await
        .unwrap();
    tokens
        .create_password_reset(1, Duration::hours(-1))
        .await
        .unwrap();
    tokens
        .create_password_reset(2, Duration::hours(1))
        .await
        .unwrap();

    let report = job(&db).run().await;
    assert_eq!(report.deleted("email_verifications"), Some(1));
    assert_eq!(report.deleted("password_resets"), Some(1));
}

#[tokio::test]
async fn test_old_security_logs_and_stale_rate_limits_are_removed() {
    let db = memory_db().await;
    let log = SecurityLog::new(db.clone(), StdDuration::from_secs(2));
    let limits = RateLimitStore::new(db.clone());
    let now = Utc::now().naive_utc();

    log.record_event(
        NewSecurityEvent::new(SecurityAction::LoginSuccess)
            .user(1)
            .occurred_at(now - Duration::days(91)),
    )
    .await;
    log.record_event(
        NewSecurityEvent::new(SecurityAction::LoginSuccess)
            .user(1)
            .occurred_at(now - Duration::days(89)),
    )
    .await;
    limits
        .hit_at("login:10.0.0.1", 5, Duration::minutes(5), now - Duration::hours(1))
        .await
        .unwrap();
    limits
        .hit_at("login:10.0.0.2", 5, Duration::minutes(5), now)
        .await
        .unwrap();

    let report = job(&db).run_at(now).await;
    assert_eq!(report.deleted("security_logs"), Some(1));
    assert_eq!(report.deleted("rate_limits"), Some(1));
    assert_eq!(security_log::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failing_table_does_not_hide_other_counts() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    store.issue(1, None, None, Duration::hours(-1)).await.unwrap();
    db.execute_unprepared("DROP TABLE rate_limits").await.unwrap();

    let report = job(&db).run().await;

    assert!(!report.is_complete());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].table, "rate_limits");
    assert!(matches!(failures[0].outcome, TableOutcome::Failed { .. }));
    assert_eq!(report.deleted("rate_limits"), None);
    assert_eq!(report.deleted("refresh_tokens"), Some(1));
    assert_eq!(report.deleted("security_logs"), Some(0));
}

#[tokio::test]
async fn test_report_serializes_per_table_status() {
    let db = memory_db().await;
    let report = job(&db).run().await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tables"][0]["table"], "refresh_tokens");
    assert_eq!(json["tables"][0]["status"], "deleted");
    assert_eq!(json["tables"][0]["rows"], 0);
}

#[tokio::test]
async fn test_trim_password_history_keeps_newest() {
    let db = memory_db().await;
    let history = PasswordHistory::new(db.clone());
    for i in 0..8 {
        history.record(1, &format!("hash-{i}")).await.unwrap();
    }
    for i in 0..3 {
        history.record(2, &format!("other-{i}")).await.unwrap();
    }

    let deleted = job(&db).trim_password_history(5).await.unwrap();
    assert_eq!(deleted, 3);

    let kept: Vec<String> = password_history::Entity::find()
        .order_by_asc(password_history::Column::Id)
        .all(&db)
        .await
        .unwrap()
        .into_iter()
        .filter(|row| row.user_id == 1)
        .map(|row| row.password_hash)
        .collect();
    assert_eq!(kept, vec!["hash-3", "hash-4", "hash-5", "hash-6", "hash-7"]);
    assert_eq!(history.recent(2, 10).await.unwrap().len(), 3);

    assert_eq!(job(&db).trim_password_history(5).await.unwrap(), 0);
}

#[tokio::test]
async fn test_scheduler_sweeps_and_can_be_disabled() {
    let db = memory_db().await;
    let store = RefreshTokenStore::new(db.clone());
    store.issue(1, None, None, Duration::hours(-1)).await.unwrap();

    let scheduler = CleanupScheduler::new(job(&db), StdDuration::from_millis(50));
    assert!(scheduler.is_enabled());
    let handle = scheduler.start();
    tokio::time::sleep(StdDuration::from_millis(300)).await;

    assert_eq!(refresh_token::Entity::find().count(&db).await.unwrap(), 0);

    scheduler.disable();
    assert!(!scheduler.is_enabled());
    // Let a sweep that was already in flight finish
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    store.issue(1, None, None, Duration::hours(-1)).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(200)).await;
    assert_eq!(
        refresh_token::Entity::find().count(&db).await.unwrap(),
        1,
        "Disabled scheduler leaves rows alone"
    );

    scheduler.enable();
    assert!(scheduler.is_enabled());
    handle.abort();
}
