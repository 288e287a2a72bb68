//! Retention sweep over the session and security tables.
//!
//! Each table is one `DELETE`, run concurrently with the others. A failing
//! table is reported and logged without hiding the counts of the rest.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, DeleteResult, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::RetentionConfig;
use crate::error::WardenError;
use crate::models::{
    email_verification, password_history, password_reset, rate_limit, refresh_token, security_log,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Deleted { rows: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: &'static str,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub ran_at: NaiveDateTime,
    pub tables: Vec<TableReport>,
}

impl CleanupReport {
    /// Rows deleted from `table`, or `None` if that table failed or was not swept.
    pub fn deleted(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .and_then(|report| match report.outcome {
                TableOutcome::Deleted { rows } => Some(rows),
                TableOutcome::Failed { .. } => None,
            })
    }

    pub fn total_deleted(&self) -> u64 {
        self.tables
            .iter()
            .filter_map(|report| match report.outcome {
                TableOutcome::Deleted { rows } => Some(rows),
                TableOutcome::Failed { .. } => None,
            })
            .sum()
    }

    pub fn failures(&self) -> Vec<&TableReport> {
        self.tables
            .iter()
            .filter(|report| matches!(report.outcome, TableOutcome::Failed { .. }))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }
}

#[derive(Clone)]
pub struct CleanupJob {
    db: DatabaseConnection,
    retention: RetentionConfig,
}

impl CleanupJob {
    pub fn new(db: DatabaseConnection, retention: RetentionConfig) -> Self {
        Self { db, retention }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// Run one sweep now.
    pub async fn run(&self) -> CleanupReport {
        self.run_at(Utc::now().naive_utc()).await
    }

    /// Run one sweep as if the clock read `now`.
    pub async fn run_at(&self, now: NaiveDateTime) -> CleanupReport {
        let revoked_cutoff = now - Duration::days(self.retention.revoked_token_grace_days);
        let log_cutoff = now - Duration::days(self.retention.security_log_days);

        let (refresh_tokens, email_verifications, password_resets, rate_limits, security_logs) = tokio::join!(
            settle(
                "refresh_tokens",
                refresh_token::Entity::delete_many()
                    .filter(
                        Condition::any()
                            .add(refresh_token::Column::ExpiresAt.lt(now))
                            .add(
                                Condition::all()
                                    .add(refresh_token::Column::Revoked.eq(true))
                                    .add(refresh_token::Column::RevokedAt.lt(revoked_cutoff)),
                            ),
                    )
                    .exec(&self.db),
            ),
            settle(
                "email_verifications",
                email_verification::Entity::delete_many()
                    .filter(
                        Condition::any()
                            .add(email_verification::Column::ExpiresAt.lt(now))
                            .add(email_verification::Column::Used.eq(true)),
                    )
                    .exec(&self.db),
            ),
            settle(
                "password_resets",
                password_reset::Entity::delete_many()
                    .filter(
                        Condition::any()
                            .add(password_reset::Column::ExpiresAt.lt(now))
                            .add(password_reset::Column::Used.eq(true)),
                    )
                    .exec(&self.db),
            ),
            settle(
                "rate_limits",
                rate_limit::Entity::delete_many()
                    .filter(rate_limit::Column::ExpireAt.lt(now))
                    .exec(&self.db),
            ),
            settle(
                "security_logs",
                security_log::Entity::delete_many()
                    .filter(security_log::Column::CreatedAt.lt(log_cutoff))
                    .exec(&self.db),
            ),
        );

        let report = CleanupReport {
            ran_at: now,
            tables: vec![
                refresh_tokens,
                email_verifications,
                password_resets,
                rate_limits,
                security_logs,
            ],
        };

        tracing::info!(
            target: "warden::cleanup",
            total_deleted = report.total_deleted(),
            failed_tables = report.failures().len(),
            "retention sweep finished"
        );
        report
    }

    /// Keep only the `max_per_user` newest password-history rows of every
    /// user. Returns the number of rows deleted.
    pub async fn trim_password_history(&self, max_per_user: u64) -> Result<u64, WardenError> {
        let per_user: Vec<(i32, i64)> = password_history::Entity::find()
            .select_only()
            .column(password_history::Column::UserId)
            .column_as(Expr::col(password_history::Column::Id).count(), "entries")
            .group_by(password_history::Column::UserId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut deleted = 0;
        for (user_id, entries) in per_user {
            if entries as u64 <= max_per_user {
                continue;
            }

            let ids: Vec<i32> = password_history::Entity::find()
                .select_only()
                .column(password_history::Column::Id)
                .filter(password_history::Column::UserId.eq(user_id))
                .order_by_desc(password_history::Column::CreatedAt)
                .order_by_desc(password_history::Column::Id)
                .into_tuple()
                .all(&self.db)
                .await?;

            let stale: Vec<i32> = ids.into_iter().skip(max_per_user as usize).collect();
            if stale.is_empty() {
                continue;
            }

            let result = password_history::Entity::delete_many()
                .filter(password_history::Column::Id.is_in(stale))
                .exec(&self.db)
                .await?;
            deleted += result.rows_affected;
        }

        tracing::debug!(target: "warden::cleanup", deleted, "password history trimmed");
        Ok(deleted)
    }
}

async fn settle(
    table: &'static str,
    deletion: impl Future<Output = Result<DeleteResult, DbErr>>,
) -> TableReport {
    let outcome = match deletion.await {
        Ok(result) => {
            tracing::debug!(target: "warden::cleanup", table, rows = result.rows_affected, "table swept");
            TableOutcome::Deleted {
                rows: result.rows_affected,
            }
        }
        Err(e) => {
            tracing::error!(target: "warden::cleanup", table, error = %e, "retention delete failed");
            TableOutcome::Failed {
                error: e.to_string(),
            }
        }
    };
    TableReport { table, outcome }
}

/// Periodic in-process trigger for [`CleanupJob`].
///
/// Ticks that fall behind are skipped, not bunched. A disabled scheduler
/// keeps ticking but does no work.
#[derive(Clone)]
pub struct CleanupScheduler {
    job: CleanupJob,
    interval: std::time::Duration,
    enabled: Arc<AtomicBool>,
}

impl CleanupScheduler {
    pub fn new(job: CleanupJob, interval: std::time::Duration) -> Self {
        Self {
            job,
            interval,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn the background task. The first sweep runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let job = self.job.clone();
        let enabled = self.enabled.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                if !enabled.load(Ordering::Relaxed) {
                    continue;
                }

                job.run().await;
                if let Err(e) = job
                    .trim_password_history(job.retention().password_history_per_user)
                    .await
                {
                    tracing::error!(target: "warden::cleanup", error = %e, "password history trim failed");
                }
            }
        })
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}
