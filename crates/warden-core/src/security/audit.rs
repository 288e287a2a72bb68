use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::models::security_log::{self, Entity as SecurityLogEntry};
use crate::security::client::ClientInfo;

/// Every kind of event the audit log knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAction {
    LoginSuccess,
    LoginFailed,
    Logout,
    Register,
    PasswordChange,
    PasswordResetRequest,
    PasswordResetComplete,
    EmailVerification,
    SessionRevoked,
    AllSessionsRevoked,
    TokenRefresh,
    TokenReuseDetected,
    RateLimited,
    SuspiciousActivity,
}

impl SecurityAction {
    pub const ALL: [SecurityAction; 14] = [
        SecurityAction::LoginSuccess,
        SecurityAction::LoginFailed,
        SecurityAction::Logout,
        SecurityAction::Register,
        SecurityAction::PasswordChange,
        SecurityAction::PasswordResetRequest,
        SecurityAction::PasswordResetComplete,
        SecurityAction::EmailVerification,
        SecurityAction::SessionRevoked,
        SecurityAction::AllSessionsRevoked,
        SecurityAction::TokenRefresh,
        SecurityAction::TokenReuseDetected,
        SecurityAction::RateLimited,
        SecurityAction::SuspiciousActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityAction::LoginSuccess => "login_success",
            SecurityAction::LoginFailed => "login_failed",
            SecurityAction::Logout => "logout",
            SecurityAction::Register => "register",
            SecurityAction::PasswordChange => "password_change",
            SecurityAction::PasswordResetRequest => "password_reset_request",
            SecurityAction::PasswordResetComplete => "password_reset_complete",
            SecurityAction::EmailVerification => "email_verification",
            SecurityAction::SessionRevoked => "session_revoked",
            SecurityAction::AllSessionsRevoked => "all_sessions_revoked",
            SecurityAction::TokenRefresh => "token_refresh",
            SecurityAction::TokenReuseDetected => "token_reuse_detected",
            SecurityAction::RateLimited => "rate_limited",
            SecurityAction::SuspiciousActivity => "suspicious_activity",
        }
    }
}

impl fmt::Display for SecurityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityAction {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| WardenError::BadRequest(format!("Unknown security action: {s}")))
    }
}

/// An audit entry waiting to be written.
#[derive(Debug, Clone)]
pub struct NewSecurityEvent {
    pub action: SecurityAction,
    pub user_id: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    /// Defaults to the time of the write
    pub occurred_at: Option<NaiveDateTime>,
}

impl NewSecurityEvent {
    pub fn new(action: SecurityAction) -> Self {
        Self {
            action,
            user_id: None,
            ip_address: None,
            user_agent: None,
            details: None,
            occurred_at: None,
        }
    }

    pub fn user(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = Some(client.ip_address.clone());
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn occurred_at(mut self, at: NaiveDateTime) -> Self {
        self.occurred_at = Some(at);
        self
    }
}

/// Narrows [`SecurityLog::query`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SecurityLogFilter {
    pub actions: Vec<SecurityAction>,
    pub since: Option<NaiveDateTime>,
    pub ip_address: Option<String>,
}

impl SecurityLogFilter {
    pub fn action(mut self, action: SecurityAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn since(mut self, since: NaiveDateTime) -> Self {
        self.since = Some(since);
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// Append-only security audit log.
///
/// Writes never fail the caller. A failed or timed-out insert is logged on
/// the `warden::audit` target and counted in [`SecurityLog::dropped_writes`].
/// Reads propagate storage errors.
#[derive(Clone)]
pub struct SecurityLog {
    db: DatabaseConnection,
    write_timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl SecurityLog {
    pub fn new(db: DatabaseConnection, write_timeout: Duration) -> Self {
        Self {
            db,
            write_timeout,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record one event. Returns whether the entry was written.
    pub async fn record(
        &self,
        action: SecurityAction,
        user_id: Option<i32>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        details: Option<serde_json::Value>,
    ) -> bool {
        self.record_event(NewSecurityEvent {
            action,
            user_id,
            ip_address: ip_address.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            details,
            occurred_at: None,
        })
        .await
    }

    /// Record a prepared event. Returns whether the entry was written.
    pub async fn record_event(&self, event: NewSecurityEvent) -> bool {
        let action = event.action;
        let user_id = event.user_id;

        let entry = security_log::ActiveModel {
            user_id: Set(event.user_id),
            action: Set(event.action.as_str().to_string()),
            ip_address: Set(event.ip_address),
            user_agent: Set(event.user_agent),
            details: Set(event.details),
            created_at: Set(event.occurred_at.unwrap_or_else(|| Utc::now().naive_utc())),
            ..Default::default()
        };

        match tokio::time::timeout(self.write_timeout, entry.insert(&self.db)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                self.report_drop(action, user_id, &e.to_string());
                false
            }
            Err(_) => {
                self.report_drop(action, user_id, "write timed out");
                false
            }
        }
    }

    fn report_drop(&self, action: SecurityAction, user_id: Option<i32>, error: &str) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::error!(
            target: "warden::audit",
            action = %action,
            user_id = ?user_id,
            error,
            dropped_total = total,
            "security log write dropped"
        );
    }

    /// Writes lost since this log (or any clone of it) was created.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Entries of `user_id` matching `filter`, newest first.
    pub async fn query(
        &self,
        user_id: i32,
        filter: SecurityLogFilter,
        limit: u64,
    ) -> Result<Vec<security_log::Model>, WardenError> {
        let mut query = SecurityLogEntry::find().filter(security_log::Column::UserId.eq(user_id));

        if !filter.actions.is_empty() {
            let actions: Vec<&str> = filter.actions.iter().map(SecurityAction::as_str).collect();
            query = query.filter(security_log::Column::Action.is_in(actions));
        }
        if let Some(since) = filter.since {
            query = query.filter(security_log::Column::CreatedAt.gte(since));
        }
        if let Some(ip) = filter.ip_address {
            query = query.filter(security_log::Column::IpAddress.eq(ip));
        }

        Ok(query
            .order_by_desc(security_log::Column::CreatedAt)
            .order_by_desc(security_log::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Distinct non-null IPs of `action` events for a user within
    /// `since..=until`.
    pub async fn distinct_ips(
        &self,
        user_id: i32,
        action: SecurityAction,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<BTreeSet<String>, WardenError> {
        let ips: Vec<String> = SecurityLogEntry::find()
            .select_only()
            .column(security_log::Column::IpAddress)
            .distinct()
            .filter(security_log::Column::UserId.eq(user_id))
            .filter(security_log::Column::Action.eq(action.as_str()))
            .filter(security_log::Column::CreatedAt.gte(since))
            .filter(security_log::Column::CreatedAt.lte(until))
            .filter(security_log::Column::IpAddress.is_not_null())
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(ips.into_iter().collect())
    }

    /// Number of `action` events for a user within `since..=until`.
    pub async fn count_between(
        &self,
        user_id: i32,
        action: SecurityAction,
        since: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<u64, WardenError> {
        Ok(SecurityLogEntry::find()
            .filter(security_log::Column::UserId.eq(user_id))
            .filter(security_log::Column::Action.eq(action.as_str()))
            .filter(security_log::Column::CreatedAt.gte(since))
            .filter(security_log::Column::CreatedAt.lte(until))
            .count(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_parse_back() {
        for action in SecurityAction::ALL {
            assert_eq!(action.as_str().parse::<SecurityAction>().ok(), Some(action));
        }
        assert!("login".parse::<SecurityAction>().is_err());
    }
}
