use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account statuses an administrator can assign. Banned and pending
/// accounts cannot log in.
pub const USER_STATUSES: [&str; 3] = ["active", "banned", "pending"];

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub registration_date: String,
    pub status: String, // 'active', 'banned', 'pending'
    pub role: String,   // 'user', 'admin'
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::book::Entity")]
    Books,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::book::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Books.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
