use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::error::WardenError;
use crate::models::password_history::{self, Entity as PasswordHistoryEntry};

/// PHC-format Argon2id hash of `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, WardenError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| WardenError::Internal(format!("argon2 hashing failed: {e}")))
}

/// Whether `password` produces `stored`. A malformed `stored` is an error,
/// a mismatch is `Ok(false)`.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, WardenError> {
    let phc = PasswordHash::new(stored)
        .map_err(|e| WardenError::Internal(format!("stored password hash unreadable: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &phc) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(WardenError::Internal(format!("argon2 verification failed: {e}"))),
    }
}

/// Previous password hashes per user, for "don't reuse your last N passwords".
///
/// Rows beyond the retention cap are removed by the cleanup job, not here.
#[derive(Clone)]
pub struct PasswordHistory {
    db: DatabaseConnection,
}

impl PasswordHistory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Remember `password_hash` as one of the user's passwords.
    pub async fn record(&self, user_id: i32, password_hash: &str) -> Result<(), WardenError> {
        password_history::ActiveModel {
            user_id: Set(user_id),
            password_hash: Set(password_hash.to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    /// Hashes of the `depth` most recent passwords, newest first.
    pub async fn recent(&self, user_id: i32, depth: u64) -> Result<Vec<String>, WardenError> {
        let rows = PasswordHistoryEntry::find()
            .filter(password_history::Column::UserId.eq(user_id))
            .order_by_desc(password_history::Column::CreatedAt)
            .order_by_desc(password_history::Column::Id)
            .limit(depth)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|row| row.password_hash).collect())
    }

    /// Whether `candidate` matches one of the `depth` most recent passwords.
    pub async fn is_reused(
        &self,
        user_id: i32,
        candidate: &str,
        depth: u64,
    ) -> Result<bool, WardenError> {
        for hash in self.recent(user_id, depth).await? {
            if verify_password(candidate, &hash)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
