use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Physical seating. `is_occupied`, `occupied_at` and `estimated_finish` are
/// derived from active orders by `services::tables::refresh_occupancy`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dining_tables")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub number: i32,
    pub capacity: i32,
    pub area: Option<String>,
    pub is_occupied: bool,
    pub occupied_at: Option<DateTime<Utc>>,
    pub estimated_finish: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::table_update_log::Entity")]
    UpdateLogs,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::table_update_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UpdateLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
