use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One issued refresh token, i.e. one session on one device.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The user who owns this refresh token
    pub user_id: i32,

    /// SHA-256 hex digest of the opaque secret handed to the client
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token_hash: String,

    /// Coarse device descriptor, e.g. "Firefox on Linux (desktop)"
    pub device_info: Option<String>,

    /// IP address that created this token
    pub ip_address: Option<String>,

    pub created_at: NaiveDateTime,

    /// When the token expires
    pub expires_at: NaiveDateTime,

    /// Whether this token has been revoked
    #[sea_orm(default_value = false)]
    pub revoked: bool,

    /// Set once, together with `revoked`
    pub revoked_at: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A token is active while it is neither revoked nor expired.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        !self.revoked && self.expires_at > now
    }
}
