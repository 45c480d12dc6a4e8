//! Dining tables and their derived occupancy.
//!
//! A table's `is_occupied`, `occupied_at` and `estimated_finish` columns are a
//! cache of what its active orders imply. They are only ever written by
//! [`refresh_occupancy`], which every order write that touches a table calls
//! on the same transaction.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use tracing::info;

use crate::entities::order::{self, OrderStatus};
use crate::entities::{dining_table, table_update_log, user};
use crate::errors::ServiceError;

/// Occupancy rule: a table is occupied once every seat is held by a distinct
/// customer with an active order. A table with no seats is never available.
pub fn occupancy(seats_taken: usize, capacity: i32) -> bool {
    let capacity = usize::try_from(capacity).unwrap_or(0);
    seats_taken >= capacity
}

pub fn available_seats(seats_taken: usize, capacity: i32) -> i32 {
    let taken = i32::try_from(seats_taken).unwrap_or(i32::MAX);
    (capacity - taken).max(0)
}

/// Snapshot of the active orders at one table.
#[derive(Debug, Default, Clone)]
pub struct TableActivity {
    pub customers: BTreeSet<i32>,
    pub order_value: Decimal,
    pub first_ordered_at: Option<DateTime<Utc>>,
    pub estimated_finish: Option<DateTime<Utc>>,
}

impl TableActivity {
    fn absorb(&mut self, order: &order::Model) {
        self.customers.insert(order.user_id);
        self.order_value += order.total_price;
        self.first_ordered_at = match self.first_ordered_at {
            Some(t) if t <= order.ordered_at => Some(t),
            _ => Some(order.ordered_at),
        };
        if let Some(ready) = order.estimated_ready_at() {
            self.estimated_finish = Some(self.estimated_finish.map_or(ready, |t| t.max(ready)));
        }
    }

    pub fn seats_taken(&self) -> usize {
        self.customers.len()
    }
}

fn active_orders() -> sea_orm::Select<order::Entity> {
    order::Entity::find().filter(order::Column::Status.is_in(OrderStatus::ACTIVE))
}

/// Active orders at one table, folded into a [`TableActivity`].
pub async fn table_activity<C: ConnectionTrait>(
    conn: &C,
    table_id: i32,
) -> Result<TableActivity, ServiceError> {
    let orders = active_orders()
        .filter(order::Column::TableId.eq(table_id))
        .all(conn)
        .await?;
    let mut activity = TableActivity::default();
    for order in &orders {
        activity.absorb(order);
    }
    Ok(activity)
}

/// Loads a table for an order write, taking a row lock where supported.
pub async fn lock_table<C: ConnectionTrait>(
    conn: &C,
    table_id: i32,
) -> Result<dining_table::Model, ServiceError> {
    dining_table::Entity::find_by_id(table_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Table {table_id} not found")))
}

/// Recomputes the cached occupancy of `table_id` from its active orders and
/// logs a line whenever the table flips between free and occupied.
pub async fn refresh_occupancy<C: ConnectionTrait>(
    conn: &C,
    table_id: i32,
) -> Result<dining_table::Model, ServiceError> {
    let table = lock_table(conn, table_id).await?;
    let activity = table_activity(conn, table_id).await?;
    let occupied = occupancy(activity.seats_taken(), table.capacity);

    let flipped = occupied != table.is_occupied;
    let unchanged = !flipped
        && table.occupied_at == activity.first_ordered_at
        && table.estimated_finish == activity.estimated_finish;
    if unchanged {
        return Ok(table);
    }

    let number = table.number;
    let now = Utc::now();
    let mut active: dining_table::ActiveModel = table.into();
    active.is_occupied = Set(occupied);
    active.occupied_at = Set(activity.first_ordered_at);
    active.estimated_finish = Set(activity.estimated_finish);
    active.updated_at = Set(now);
    let updated = active.update(conn).await?;

    if flipped {
        let message = if occupied {
            format!("Table {number} is now occupied")
        } else {
            format!("Table {number} is now available")
        };
        info!(table_id, occupied, "{message}");
        table_update_log::ActiveModel {
            table_id: Set(table_id),
            message: Set(message),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    Ok(updated)
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub id: i32,
    pub number: i32,
    pub capacity: i32,
    pub area: Option<String>,
    pub is_occupied: bool,
    pub available_seats: i32,
    pub customers: Vec<String>,
    pub order_value: Decimal,
    pub occupied_at: Option<DateTime<Utc>>,
    pub estimated_finish: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TableService {
    db: Arc<DatabaseConnection>,
}

impl TableService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All tables with seats and customers computed from live orders.
    pub async fn list(&self) -> Result<Vec<TableView>, ServiceError> {
        let db = &*self.db;
        let tables = dining_table::Entity::find()
            .order_by_asc(dining_table::Column::Number)
            .all(db)
            .await?;
        let orders = active_orders()
            .filter(order::Column::TableId.is_not_null())
            .all(db)
            .await?;

        let mut by_table: HashMap<i32, TableActivity> = HashMap::new();
        for order in &orders {
            if let Some(table_id) = order.table_id {
                by_table.entry(table_id).or_default().absorb(order);
            }
        }

        let user_ids: BTreeSet<i32> = orders.iter().map(|o| o.user_id).collect();
        let names: HashMap<i32, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.display_name().to_string()))
                .collect()
        };

        Ok(tables
            .into_iter()
            .map(|table| {
                let activity = by_table.remove(&table.id).unwrap_or_default();
                let seats_taken = activity.seats_taken();
                TableView {
                    id: table.id,
                    number: table.number,
                    capacity: table.capacity,
                    area: table.area,
                    is_occupied: occupancy(seats_taken, table.capacity),
                    available_seats: available_seats(seats_taken, table.capacity),
                    customers: activity
                        .customers
                        .iter()
                        .filter_map(|id| names.get(id).cloned())
                        .collect(),
                    order_value: activity.order_value,
                    occupied_at: activity.first_ordered_at,
                    estimated_finish: activity.estimated_finish,
                }
            })
            .collect())
    }

    /// Most recent occupancy changes, newest first.
    pub async fn recent_updates(&self, limit: u64) -> Result<Vec<table_update_log::Model>, ServiceError> {
        Ok(table_update_log::Entity::find()
            .order_by_desc(table_update_log::Column::CreatedAt)
            .order_by_desc(table_update_log::Column::Id)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 4, false)]
    #[case(3, 4, false)]
    #[case(4, 4, true)]
    #[case(5, 4, true)]
    #[case(0, 0, true)]
    fn occupancy_threshold(#[case] taken: usize, #[case] capacity: i32, #[case] occupied: bool) {
        assert_eq!(occupancy(taken, capacity), occupied);
    }

    proptest! {
        #[test]
        fn free_seats_and_occupancy_agree(taken in 0usize..64, capacity in 0i32..32) {
            let free = available_seats(taken, capacity);
            prop_assert!(free >= 0);
            prop_assert_eq!(free == 0, occupancy(taken, capacity));
        }
    }

    #[test]
    fn activity_tracks_distinct_customers_and_latest_finish() {
        let now = Utc::now();
        let base = order::Model {
            id: 1,
            user_id: 7,
            table_id: Some(1),
            status: OrderStatus::Preparing,
            total_price: Decimal::new(150, 0),
            prepare_duration: Some(10),
            ordered_at: now,
            confirmed_at: Some(now),
            preparing_at: Some(now),
            delivered_at: None,
            confirmed_by: None,
            prepared_by: None,
            delivered_by: None,
            cancelled_by: None,
            refunded_by: None,
            updated_at: now,
        };
        let second = order::Model {
            id: 2,
            prepare_duration: Some(20),
            ..base.clone()
        };

        let mut activity = TableActivity::default();
        activity.absorb(&base);
        activity.absorb(&second);

        assert_eq!(activity.seats_taken(), 1);
        assert_eq!(activity.order_value, Decimal::new(300, 0));
        assert_eq!(
            activity.estimated_finish,
            Some(now + chrono::Duration::minutes(20))
        );
    }
}
