use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::error::WardenError;
use crate::models::rate_limit::{self, Entity as RateLimit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Fixed-window attempt counter shared by every process on the database.
///
/// Expired windows are replaced lazily on the next hit and swept by the
/// cleanup job.
#[derive(Clone)]
pub struct RateLimitStore {
    db: DatabaseConnection,
}

impl RateLimitStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Count one attempt against `key`, allowing at most `max` per `window`.
    pub async fn hit(
        &self,
        key: &str,
        max: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, WardenError> {
        self.hit_at(key, max, window, Utc::now().naive_utc()).await
    }

    pub async fn hit_at(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        now: NaiveDateTime,
    ) -> Result<RateLimitDecision, WardenError> {
        if max == 0 {
            return Ok(RateLimitDecision::Limited {
                retry_after_secs: window.num_seconds().max(1) as u64,
            });
        }
        let max_count = i32::try_from(max).unwrap_or(i32::MAX);

        // A concurrent hit can open the window between our steps; one retry
        // then lands in the increment path.
        for _ in 0..2 {
            let bumped = RateLimit::update_many()
                .col_expr(
                    rate_limit::Column::Count,
                    Expr::col(rate_limit::Column::Count).add(1),
                )
                .filter(rate_limit::Column::Key.eq(key))
                .filter(rate_limit::Column::ExpireAt.gt(now))
                .filter(rate_limit::Column::Count.lt(max_count))
                .exec(&self.db)
                .await?;

            if bumped.rows_affected == 1 {
                let count = RateLimit::find_by_id(key.to_string())
                    .one(&self.db)
                    .await?
                    .map(|row| row.count)
                    .unwrap_or(max_count);
                return Ok(RateLimitDecision::Allowed {
                    remaining: (max_count - count).max(0) as u32,
                });
            }

            RateLimit::delete_many()
                .filter(rate_limit::Column::Key.eq(key))
                .filter(rate_limit::Column::ExpireAt.lte(now))
                .exec(&self.db)
                .await?;

            let inserted = RateLimit::insert(rate_limit::ActiveModel {
                key: Set(key.to_string()),
                count: Set(1),
                expire_at: Set(now + window),
            })
            .on_conflict(
                OnConflict::column(rate_limit::Column::Key)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

            if inserted == 1 {
                return Ok(RateLimitDecision::Allowed {
                    remaining: max - 1,
                });
            }

            if let Some(row) = RateLimit::find_by_id(key.to_string()).one(&self.db).await? {
                if row.expire_at > now && row.count >= max_count {
                    return Ok(RateLimitDecision::Limited {
                        retry_after_secs: (row.expire_at - now).num_seconds().max(1) as u64,
                    });
                }
            }
        }

        tracing::warn!(key, "rate limit window contended, treating as limited");
        Ok(RateLimitDecision::Limited {
            retry_after_secs: 1,
        })
    }

    /// Forget the window of `key` (e.g. after a successful login).
    pub async fn reset(&self, key: &str) -> Result<(), WardenError> {
        RateLimit::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
