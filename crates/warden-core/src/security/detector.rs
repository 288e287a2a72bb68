//! Heuristic risk assessment over the audit log.
//!
//! A [`Verdict`] is a set of named reasons. All heuristics are evaluated
//! every time so an operator sees every signal that fired, not just the
//! first one.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::DetectorConfig;
use crate::error::WardenError;
use crate::security::audit::{NewSecurityEvent, SecurityAction, SecurityLog};

/// Failed logins for the user came from too many distinct IPs recently.
pub const MULTIPLE_IPS_FAILED_LOGIN: &str = "multiple_ips_failed_login";
/// The user has known login locations and the current IP is not one of them.
pub const NEW_IP_LOGIN: &str = "new_ip_login";
/// Several password changes in a short window.
pub const FREQUENT_PASSWORD_CHANGES: &str = "frequent_password_changes";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub suspicious: bool,
    pub reasons: BTreeSet<String>,
}

impl Verdict {
    /// A verdict with no reasons.
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn has(&self, reason: &str) -> bool {
        self.reasons.contains(reason)
    }

    fn flag(&mut self, reason: &str) {
        self.reasons.insert(reason.to_string());
        self.suspicious = true;
    }
}

#[derive(Clone)]
pub struct SuspiciousActivityDetector {
    log: SecurityLog,
    config: DetectorConfig,
}

impl SuspiciousActivityDetector {
    pub fn new(log: SecurityLog, config: DetectorConfig) -> Self {
        Self { log, config }
    }

    /// Evaluate the current login of `user_id` from `current_ip`.
    ///
    /// Must run before the caller records this login's `login_success`,
    /// otherwise the current IP is already "known".
    pub async fn check(&self, user_id: i32, current_ip: &str) -> Result<Verdict, WardenError> {
        self.check_at(user_id, current_ip, Utc::now().naive_utc())
            .await
    }

    pub async fn check_at(
        &self,
        user_id: i32,
        current_ip: &str,
        now: NaiveDateTime,
    ) -> Result<Verdict, WardenError> {
        let failed_since = now - Duration::minutes(self.config.failed_login_window_minutes);
        let known_since = now - Duration::days(self.config.known_ip_lookback_days);
        let changes_since = now - Duration::hours(self.config.password_change_window_hours);

        let (failed_ips, known_ips, password_changes) = tokio::try_join!(
            self.log
                .distinct_ips(user_id, SecurityAction::LoginFailed, failed_since, now),
            self.log
                .distinct_ips(user_id, SecurityAction::LoginSuccess, known_since, now),
            self.log
                .count_between(user_id, SecurityAction::PasswordChange, changes_since, now),
        )?;

        let mut verdict = Verdict::clear();
        if failed_ips.len() as u64 >= self.config.failed_login_distinct_ips {
            verdict.flag(MULTIPLE_IPS_FAILED_LOGIN);
        }
        if !known_ips.is_empty() && !known_ips.contains(current_ip) {
            verdict.flag(NEW_IP_LOGIN);
        }
        if password_changes >= self.config.password_change_burst {
            verdict.flag(FREQUENT_PASSWORD_CHANGES);
        }

        if verdict.suspicious {
            tracing::warn!(
                user_id,
                current_ip,
                reasons = ?verdict.reasons,
                "suspicious activity detected"
            );
            self.log
                .record_event(
                    NewSecurityEvent::new(SecurityAction::SuspiciousActivity)
                        .user(user_id)
                        .ip(current_ip)
                        .occurred_at(now)
                        .details(json!({
                            "reasons": verdict.reasons,
                            "current_ip": current_ip,
                            "known_ips": known_ips,
                        })),
                )
                .await;
        }

        Ok(verdict)
    }
}
