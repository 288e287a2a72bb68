//! Single-use tokens carried by verification and password-reset emails.
//!
//! Sending the email is the caller's job; this module only mints the secret
//! and consumes it once.

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::auth::tokens::{generate_secure_token, hash_token};
use crate::error::WardenError;
use crate::models::{email_verification, password_reset};

#[derive(Clone)]
pub struct VerificationTokens {
    db: DatabaseConnection,
}

impl VerificationTokens {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create an email-verification token. Returns the raw token.
    pub async fn create_email_verification(
        &self,
        user_id: i32,
        ttl: Duration,
    ) -> Result<String, WardenError> {
        let raw_token = generate_secure_token();
        let now = Utc::now().naive_utc();

        email_verification::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(hash_token(&raw_token)),
            expires_at: Set(now + ttl),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(raw_token)
    }

    /// Consume an email-verification token and return its user id.
    pub async fn consume_email_verification(&self, raw_token: &str) -> Result<i32, WardenError> {
        let token_hash = hash_token(raw_token);
        let now = Utc::now().naive_utc();

        let claimed = email_verification::Entity::update_many()
            .col_expr(email_verification::Column::Used, Expr::value(true))
            .filter(email_verification::Column::TokenHash.eq(&token_hash))
            .filter(email_verification::Column::Used.eq(false))
            .filter(email_verification::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await?;

        if claimed.rows_affected != 1 {
            return Err(WardenError::BadRequest(
                "Invalid or expired verification token".to_string(),
            ));
        }

        email_verification::Entity::find()
            .filter(email_verification::Column::TokenHash.eq(&token_hash))
            .one(&self.db)
            .await?
            .map(|row| row.user_id)
            .ok_or_else(|| WardenError::NotFound("Verification token vanished".to_string()))
    }

    /// Create a password-reset token. Returns the raw token to send to the user.
    pub async fn create_password_reset(
        &self,
        user_id: i32,
        ttl: Duration,
    ) -> Result<String, WardenError> {
        let raw_token = generate_secure_token();
        let now = Utc::now().naive_utc();

        password_reset::ActiveModel {
            user_id: Set(user_id),
            token_hash: Set(hash_token(&raw_token)),
            expires_at: Set(now + ttl),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(raw_token)
    }

    /// Consume a password-reset token and return its user id.
    pub async fn consume_password_reset(&self, raw_token: &str) -> Result<i32, WardenError> {
        let token_hash = hash_token(raw_token);
        let now: NaiveDateTime = Utc::now().naive_utc();

        let claimed = password_reset::Entity::update_many()
            .col_expr(password_reset::Column::Used, Expr::value(true))
            .filter(password_reset::Column::TokenHash.eq(&token_hash))
            .filter(password_reset::Column::Used.eq(false))
            .filter(password_reset::Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await?;

        if claimed.rows_affected != 1 {
            return Err(WardenError::BadRequest(
                "Invalid or expired password reset token".to_string(),
            ));
        }

        password_reset::Entity::find()
            .filter(password_reset::Column::TokenHash.eq(&token_hash))
            .one(&self.db)
            .await?
            .map(|row| row.user_id)
            .ok_or_else(|| WardenError::NotFound("Password reset token vanished".to_string()))
    }
}
