use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::auth::tokens::{generate_secure_token, hash_token};
use crate::error::WardenError;
use crate::models::refresh_token::{self, Entity as RefreshToken};

/// A freshly issued refresh token. `secret` goes to the client and is not
/// recoverable from the database afterwards.
#[derive(Clone)]
pub struct IssuedRefreshToken {
    pub id: i32,
    pub secret: String,
    pub expires_at: NaiveDateTime,
}

impl std::fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful rotation.
#[derive(Debug, Clone)]
pub struct RotatedToken {
    pub user_id: i32,
    /// Row id of the token that was consumed
    pub previous_id: i32,
    pub token: IssuedRefreshToken,
}

/// What happened when a refresh secret was presented for rotation.
#[derive(Debug, Clone)]
pub enum Rotation {
    Rotated(RotatedToken),
    /// An already-revoked secret was replayed. Every session of the user has
    /// been revoked in response.
    ReuseDetected { user_id: i32, revoked_sessions: u64 },
    /// Unknown, expired, or consumed concurrently by another request.
    Invalid,
}

/// Persistence for refresh tokens (`refresh_tokens`).
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: DatabaseConnection,
}

impl RefreshTokenStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a new active token for `user_id`. Only the hash is stored.
    pub async fn issue(
        &self,
        user_id: i32,
        device_info: Option<String>,
        ip_address: Option<String>,
        ttl: Duration,
    ) -> Result<IssuedRefreshToken, WardenError> {
        let secret = generate_secure_token();
        let now = Utc::now().naive_utc();
        let expires_at = now + ttl;

        let model = refresh_token::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(hash_token(&secret)),
            device_info: Set(device_info),
            ip_address: Set(ip_address),
            created_at: Set(now),
            expires_at: Set(expires_at),
            revoked: Set(false),
            revoked_at: Set(None),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await?;

        Ok(IssuedRefreshToken {
            id: inserted.id,
            secret,
            expires_at,
        })
    }

    /// Revoke a token by row id. Returns `true` only for the call that
    /// actually flipped the flag; repeated or concurrent calls return `false`.
    pub async fn revoke(&self, token_id: i32) -> Result<bool, WardenError> {
        self.revoke_at(token_id, Utc::now().naive_utc()).await
    }

    /// Revoke a token by row id, stamping `revoked_at = now`.
    pub async fn revoke_at(&self, token_id: i32, now: NaiveDateTime) -> Result<bool, WardenError> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .filter(refresh_token::Column::Id.eq(token_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Revoke a token by its raw secret.
    pub async fn revoke_secret(&self, secret: &str) -> Result<bool, WardenError> {
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(
                refresh_token::Column::RevokedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(refresh_token::Column::TokenHash.eq(hash_token(secret)))
            .filter(refresh_token::Column::Revoked.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Revoke every live token of a user (logout-all / security event).
    ///
    /// Expired tokens are left alone and not counted.
    pub async fn revoke_all_for_user(&self, user_id: i32) -> Result<u64, WardenError> {
        let now = Utc::now().naive_utc();
        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::Revoked, Expr::value(true))
            .col_expr(refresh_token::Column::RevokedAt, Expr::value(now))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    /// Whether `secret` belongs to a token that is neither revoked nor expired.
    pub async fn is_active(&self, secret: &str) -> Result<bool, WardenError> {
        let count = RefreshToken::find()
            .filter(refresh_token::Column::TokenHash.eq(hash_token(secret)))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(Utc::now().naive_utc()))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Look up the row behind a secret, regardless of its state.
    pub async fn find_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<refresh_token::Model>, WardenError> {
        Ok(RefreshToken::find()
            .filter(refresh_token::Column::TokenHash.eq(hash_token(secret)))
            .one(&self.db)
            .await?)
    }

    /// Active tokens of a user, newest first.
    pub async fn list_active_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<refresh_token::Model>, WardenError> {
        Ok(RefreshToken::find()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Revoked.eq(false))
            .filter(refresh_token::Column::ExpiresAt.gt(Utc::now().naive_utc()))
            .order_by_desc(refresh_token::Column::CreatedAt)
            .order_by_desc(refresh_token::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Consume `secret` and issue its replacement (token rotation).
    ///
    /// Replaying a secret that was already revoked is treated as theft: all
    /// of the owner's tokens are revoked and [`Rotation::ReuseDetected`] is
    /// returned. The replacement inherits nothing from the old row except
    /// the owner.
    pub async fn rotate(
        &self,
        secret: &str,
        device_info: Option<String>,
        ip_address: Option<String>,
        ttl: Duration,
    ) -> Result<Rotation, WardenError> {
        let Some(current) = self.find_by_secret(secret).await? else {
            return Ok(Rotation::Invalid);
        };

        if current.revoked {
            let revoked_sessions = self.revoke_all_for_user(current.user_id).await?;
            tracing::warn!(
                user_id = current.user_id,
                token_id = current.id,
                revoked_sessions,
                "revoked refresh token presented again; all sessions revoked"
            );
            return Ok(Rotation::ReuseDetected {
                user_id: current.user_id,
                revoked_sessions,
            });
        }

        if !current.is_active_at(Utc::now().naive_utc()) {
            return Ok(Rotation::Invalid);
        }

        // Only the request that flips the flag gets a replacement.
        if !self.revoke(current.id).await? {
            return Ok(Rotation::Invalid);
        }

        let token = self
            .issue(current.user_id, device_info, ip_address, ttl)
            .await?;

        Ok(Rotation::Rotated(RotatedToken {
            user_id: current.user_id,
            previous_id: current.id,
            token,
        }))
    }
}
