use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::auth::refresh::RefreshTokenStore;
use crate::auth::tokens::hash_token;
use crate::error::WardenError;
use crate::models::refresh_token::{self, Entity as RefreshToken};

/// A session as shown to its owner. Never carries the secret or its hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionView {
    pub id: i32,
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl From<refresh_token::Model> for SessionView {
    fn from(token: refresh_token::Model) -> Self {
        SessionView {
            id: token.id,
            device_info: token.device_info,
            ip_address: token.ip_address,
            created_at: token.created_at,
            expires_at: token.expires_at,
        }
    }
}

/// User-facing control over active refresh tokens.
#[derive(Clone)]
pub struct SessionRegistry {
    db: DatabaseConnection,
    tokens: RefreshTokenStore,
}

impl SessionRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            tokens: RefreshTokenStore::new(db.clone()),
            db,
        }
    }

    /// Active sessions of `user_id`, newest first.
    pub async fn list_sessions(&self, user_id: i32) -> Result<Vec<SessionView>, WardenError> {
        let sessions = self.tokens.list_active_for_user(user_id).await?;
        Ok(sessions.into_iter().map(SessionView::from).collect())
    }

    /// Revoke one of the caller's own active sessions.
    ///
    /// Returns `false` when no active session with that id belongs to
    /// `user_id`; "missing" and "someone else's" look the same.
    pub async fn revoke_session(&self, user_id: i32, session_id: i32) -> Result<bool, WardenError> {
        let now = Utc::now().naive_utc();
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .filter(refresh_token::Column::Id.eq(session_id))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Sign out every other device, keeping the session behind `keep_secret`.
    pub async fn revoke_other_sessions(
        &self,
        user_id: i32,
        keep_secret: &str,
    ) -> Result<u64, WardenError> {
        let now = Utc::now().naive_utc();
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .filter(refresh_token::Column::TokenHash.ne(hash_token(keep_secret)))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Sign out everywhere.
    pub async fn revoke_all(&self, user_id: i32) -> Result<u64, WardenError> {
        self.tokens.revoke_all_for_user(user_id).await
    }
}
