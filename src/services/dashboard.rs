use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;

use crate::entities::order::{self, OrderStatus};
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::{dining_table, user};
use crate::errors::ServiceError;
use crate::services::orders::{load_details, OrderDetail};

const RECENT_ORDERS: u64 = 4;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_orders: u64,
    /// Sum of order totals, excluding cancelled and refunded orders.
    pub total_sales: Decimal,
    pub avg_order_value: Decimal,
    /// "occupied/total", as shown on the floor board.
    pub active_tables: String,
    pub orders_in_queue: u64,
    pub pending_payments: u64,
    pub active_users: u64,
    pub recent_orders: Vec<OrderDetail>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;

        let total_orders = order::Entity::find().count(db).await?;
        let spend = || {
            order::Entity::find()
                .filter(order::Column::Status.is_not_in([OrderStatus::Cancelled, OrderStatus::Refunded]))
        };
        let counted = spend().count(db).await?;
        let total_sales = spend()
            .select_only()
            .column_as(order::Column::TotalPrice.sum(), "total")
            .into_tuple::<Option<Decimal>>()
            .one(db)
            .await?
            .flatten()
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);
        let avg_order_value = if counted == 0 {
            Decimal::ZERO
        } else {
            (total_sales / Decimal::from(counted))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        let orders_in_queue = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;

        let tables = dining_table::Entity::find().count(db).await?;
        let occupied = dining_table::Entity::find()
            .filter(dining_table::Column::IsOccupied.eq(true))
            .count(db)
            .await?;

        let pending_payments = payment::Entity::find()
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .count(db)
            .await?;
        let active_users = user::Entity::find()
            .filter(user::Column::IsActive.eq(true))
            .count(db)
            .await?;

        let recent = order::Entity::find()
            .order_by_desc(order::Column::OrderedAt)
            .order_by_desc(order::Column::Id)
            .limit(RECENT_ORDERS)
            .all(db)
            .await?;

        Ok(DashboardSummary {
            total_orders,
            total_sales,
            avg_order_value,
            active_tables: format!("{occupied}/{tables}"),
            orders_in_queue,
            pending_payments,
            active_users,
            recent_orders: load_details(db, recent).await?,
        })
    }
}
