use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only security audit entry.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "security_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Absent for unauthenticated events (e.g. a failed login for an unknown email)
    pub user_id: Option<i32>,

    /// Snake-case action name, see `SecurityAction`
    pub action: String,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,

    /// Free-form structured payload
    pub details: Option<Json>,

    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
