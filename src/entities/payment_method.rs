use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lookup of the settlement methods the canteen accepts. Rows are seeded by
/// the migrator; disabling one stops new checkouts using it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_methods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: PaymentMethodKind,
    pub label: String,
    pub is_enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum PaymentMethodKind {
    #[sea_orm(string_value = "wallet")]
    Wallet,
    #[sea_orm(string_value = "qr")]
    Qr,
    #[sea_orm(string_value = "counter")]
    Counter,
}
