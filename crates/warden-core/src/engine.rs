use chrono::Duration;
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::auth::{
    IssuedRefreshToken, PasswordHistory, RefreshTokenStore, Rotation, SessionRegistry,
    TokenCodec, VerificationTokens,
};
use crate::cleanup::CleanupJob;
use crate::config::Config;
use crate::error::WardenError;
use crate::security::{
    ClientInfo, NewSecurityEvent, RateLimitDecision, RateLimitStore, SecurityAction,
    SecurityLog, SuspiciousActivityDetector, Verdict,
};

/// Credentials handed out after a successful login.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub access_token: String,
    pub refresh_token: IssuedRefreshToken,
    pub verdict: Verdict,
}

#[derive(Debug, Clone)]
pub struct RefreshedSession {
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: IssuedRefreshToken,
}

/// All session and security components over one database.
///
/// Password checks and user storage stay with the caller; the facade runs
/// the bookkeeping around them.
#[derive(Clone)]
pub struct Warden {
    pub codec: TokenCodec,
    pub refresh_tokens: RefreshTokenStore,
    pub audit: SecurityLog,
    pub detector: SuspiciousActivityDetector,
    pub sessions: SessionRegistry,
    pub cleanup: CleanupJob,
    pub rate_limits: RateLimitStore,
    pub verifications: VerificationTokens,
    pub password_history: PasswordHistory,
    refresh_ttl: Duration,
}

impl Warden {
    pub fn new(db: DatabaseConnection, config: &Config) -> Self {
        let audit = SecurityLog::new(db.clone(), config.audit_write_timeout());
        Self {
            codec: TokenCodec::new(&config.jwt_secret, config.access_token_ttl()),
            refresh_tokens: RefreshTokenStore::new(db.clone()),
            detector: SuspiciousActivityDetector::new(audit.clone(), config.detector.clone()),
            audit,
            sessions: SessionRegistry::new(db.clone()),
            cleanup: CleanupJob::new(db.clone(), config.retention.clone()),
            rate_limits: RateLimitStore::new(db.clone()),
            verifications: VerificationTokens::new(db.clone()),
            password_history: PasswordHistory::new(db),
            refresh_ttl: config.refresh_token_ttl(),
        }
    }

    /// Bookkeeping for a login whose credentials the caller already checked.
    ///
    /// The verdict is advisory. A detector failure is logged and the login
    /// proceeds with a clear verdict.
    pub async fn start_session(
        &self,
        user_id: i32,
        client: &ClientInfo,
    ) -> Result<SessionStart, WardenError> {
        let verdict = match self.detector.check(user_id, &client.ip_address).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "suspicious activity check failed");
                Verdict::clear()
            }
        };

        self.audit
            .record_event(
                NewSecurityEvent::new(SecurityAction::LoginSuccess)
                    .user(user_id)
                    .client(client)
                    .details(json!({ "device": client.device.to_string() })),
            )
            .await;

        let refresh_token = self
            .refresh_tokens
            .issue(
                user_id,
                Some(client.device.to_string()),
                Some(client.ip_address.clone()),
                self.refresh_ttl,
            )
            .await?;
        let access_token = self.codec.issue(user_id)?;

        Ok(SessionStart {
            access_token,
            refresh_token,
            verdict,
        })
    }

    /// Record a rejected login. `user_id` is `None` for unknown accounts.
    pub async fn record_failed_login(
        &self,
        user_id: Option<i32>,
        client: &ClientInfo,
        reason: &str,
    ) {
        let mut event = NewSecurityEvent::new(SecurityAction::LoginFailed)
            .client(client)
            .details(json!({ "reason": reason }));
        event.user_id = user_id;
        self.audit.record_event(event).await;
    }

    /// Exchange a refresh secret for a new access token and refresh secret.
    pub async fn refresh_session(
        &self,
        secret: &str,
        client: &ClientInfo,
    ) -> Result<RefreshedSession, WardenError> {
        let rotation = self
            .refresh_tokens
            .rotate(
                secret,
                Some(client.device.to_string()),
                Some(client.ip_address.clone()),
                self.refresh_ttl,
            )
            .await?;

        match rotation {
            Rotation::Rotated(rotated) => {
                self.audit
                    .record_event(
                        NewSecurityEvent::new(SecurityAction::TokenRefresh)
                            .user(rotated.user_id)
                            .client(client)
                            .details(json!({
                                "previous_token_id": rotated.previous_id,
                                "token_id": rotated.token.id,
                            })),
                    )
                    .await;

                Ok(RefreshedSession {
                    user_id: rotated.user_id,
                    access_token: self.codec.issue(rotated.user_id)?,
                    refresh_token: rotated.token,
                })
            }
            Rotation::ReuseDetected {
                user_id,
                revoked_sessions,
            } => {
                self.audit
                    .record_event(
                        NewSecurityEvent::new(SecurityAction::TokenReuseDetected)
                            .user(user_id)
                            .client(client)
                            .details(json!({ "revoked_sessions": revoked_sessions })),
                    )
                    .await;
                Err(WardenError::Unauthorized(
                    "Refresh token has been revoked. All sessions invalidated for security."
                        .to_string(),
                ))
            }
            Rotation::Invalid => Err(WardenError::Unauthorized(
                "Invalid or expired refresh token".to_string(),
            )),
        }
    }

    /// Log out the session behind `secret`. Returns whether it was still active.
    pub async fn end_session(&self, secret: &str, client: &ClientInfo) -> Result<bool, WardenError> {
        let Some(token) = self.refresh_tokens.find_by_secret(secret).await? else {
            return Ok(false);
        };

        let revoked = self.refresh_tokens.revoke(token.id).await?;
        if revoked {
            self.audit
                .record_event(
                    NewSecurityEvent::new(SecurityAction::Logout)
                        .user(token.user_id)
                        .client(client)
                        .details(json!({ "token_id": token.id })),
                )
                .await;
        }
        Ok(revoked)
    }

    /// Bookkeeping after the caller stored a new password hash: audit entry,
    /// history row, and every refresh token revoked. Returns revoked count.
    pub async fn password_changed(
        &self,
        user_id: i32,
        new_hash: &str,
        client: &ClientInfo,
    ) -> Result<u64, WardenError> {
        self.audit
            .record_event(
                NewSecurityEvent::new(SecurityAction::PasswordChange)
                    .user(user_id)
                    .client(client),
            )
            .await;

        self.password_history.record(user_id, new_hash).await?;
        let revoked = self.refresh_tokens.revoke_all_for_user(user_id).await?;

        if revoked > 0 {
            self.audit
                .record_event(
                    NewSecurityEvent::new(SecurityAction::AllSessionsRevoked)
                        .user(user_id)
                        .client(client)
                        .details(json!({ "revoked_sessions": revoked, "cause": "password_change" })),
                )
                .await;
        }
        Ok(revoked)
    }

    /// Count an attempt against `key`; over the limit yields
    /// [`WardenError::TooManyRequests`] and a `rate_limited` audit entry.
    pub async fn throttle(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        client: &ClientInfo,
    ) -> Result<(), WardenError> {
        match self.rate_limits.hit(key, max, window).await? {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Limited { retry_after_secs } => {
                self.audit
                    .record_event(
                        NewSecurityEvent::new(SecurityAction::RateLimited)
                            .client(client)
                            .details(json!({ "key": key, "retry_after_secs": retry_after_secs })),
                    )
                    .await;
                Err(WardenError::TooManyRequests { retry_after_secs })
            }
        }
    }
}
