use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed-window counter for one rate-limit key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rate_limits")]
pub struct Model {
    /// e.g. "login:203.0.113.9"
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    pub count: i32,

    /// End of the current window. Note the column is `expire_at`, not `expires_at`.
    pub expire_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
