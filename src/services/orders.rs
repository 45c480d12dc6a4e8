//! Orders: customer and staff listings, order detail, and status changes.
//!
//! Status changes run in one transaction that also settles a refund, updates
//! the customer's counters and refreshes the table's occupancy.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Condition, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::auth::{perm, rbac, AuthUser};
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_item::{self, DELETED_PRODUCT_LABEL};
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::payment_method::PaymentMethodKind;
use crate::entities::{dining_table, product, user};
use crate::errors::ServiceError;
use crate::services::order_status::{
    check_transition, parse_status, validate_prepare_duration, Transition,
};
use crate::services::payments::refund_payment;
use crate::services::tables::refresh_occupancy;
use crate::services::{Page, PageRequest};

#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product_id: Option<i32>,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub id: i32,
    pub transaction_id: String,
    pub method: PaymentMethodKind,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub screenshot: Option<String>,
    pub remarks: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&payment::Model> for PaymentSummary {
    fn from(p: &payment::Model) -> Self {
        Self {
            id: p.id,
            transaction_id: p.transaction_id(),
            method: p.method,
            amount: p.amount,
            status: p.status,
            screenshot: p.screenshot.clone(),
            remarks: p.remarks.clone(),
            paid_at: p.paid_at,
        }
    }
}

/// Who moved the order through each step.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAudit {
    pub confirmed_by: Option<i32>,
    pub prepared_by: Option<i32>,
    pub delivered_by: Option<i32>,
    pub cancelled_by: Option<i32>,
    pub refunded_by: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub id: i32,
    pub user_id: i32,
    pub customer: String,
    pub table_id: Option<i32>,
    pub table_number: Option<i32>,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub prepare_duration: Option<i32>,
    pub ordered_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_ready_at: Option<DateTime<Utc>>,
    pub audit: OrderAudit,
    pub items: Vec<OrderLine>,
    pub payment: Option<PaymentSummary>,
}

/// Customer facing order tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderView {
    /// Orders still being worked on.
    #[default]
    Current,
    /// Delivered orders.
    History,
    /// Cancelled and refunded orders.
    Cancelled,
}

impl OrderView {
    pub fn statuses(self) -> &'static [OrderStatus] {
        match self {
            OrderView::Current => &OrderStatus::ACTIVE,
            OrderView::History => &[OrderStatus::Delivered],
            OrderView::Cancelled => &[OrderStatus::Cancelled, OrderStatus::Refunded],
        }
    }
}

/// Staff listing filters. Dates are inclusive calendar days in UTC.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    pub prepare_duration: Option<i32>,
}

/// Recomputes the user's order count and spend from their orders.
///
/// Every order ever placed is counted; cancelled and refunded orders do not
/// count towards spend.
pub(crate) async fn refresh_user_counters<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<user::Model, ServiceError> {
    let orders = order::Entity::find()
        .filter(order::Column::UserId.eq(user_id))
        .all(conn)
        .await?;
    let orders_count = i32::try_from(orders.len())
        .map_err(|_| ServiceError::InternalError("order count overflow".to_string()))?;
    let total_spent: Decimal = orders
        .iter()
        .filter(|o| o.status.counts_as_spend())
        .map(|o| o.total_price)
        .sum();

    let user = user::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))?;
    if user.orders_count == orders_count && user.total_spent == total_spent {
        return Ok(user);
    }

    let mut active: user::ActiveModel = user.into();
    active.orders_count = Set(orders_count);
    active.total_spent = Set(total_spent);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Builds [`OrderDetail`]s for a batch of orders with one query per related
/// table.
pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderDetail>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let user_ids: BTreeSet<i32> = orders.iter().map(|o| o.user_id).collect();
    let table_ids: BTreeSet<i32> = orders.iter().filter_map(|o| o.table_id).collect();

    let mut lines: HashMap<i32, Vec<OrderLine>> = HashMap::new();
    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids.clone()))
        .find_also_related(product::Entity)
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    for (item, product) in items {
        lines.entry(item.order_id).or_default().push(OrderLine {
            product_id: item.product_id,
            product_name: product
                .map(|p| p.name)
                .unwrap_or_else(|| DELETED_PRODUCT_LABEL.to_string()),
            quantity: item.quantity,
            price: item.price,
            line_total: item.line_total(),
        });
    }

    let payments: HashMap<i32, payment::Model> = payment::Entity::find()
        .filter(payment::Column::OrderId.is_in(order_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.order_id, p))
        .collect();
    let names: HashMap<i32, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name().to_string()))
        .collect();
    let table_numbers: HashMap<i32, i32> = if table_ids.is_empty() {
        HashMap::new()
    } else {
        dining_table::Entity::find()
            .filter(dining_table::Column::Id.is_in(table_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|t| (t.id, t.number))
            .collect()
    };

    Ok(orders
        .into_iter()
        .map(|o| OrderDetail {
            id: o.id,
            user_id: o.user_id,
            customer: names.get(&o.user_id).cloned().unwrap_or_default(),
            table_id: o.table_id,
            table_number: o.table_id.and_then(|id| table_numbers.get(&id).copied()),
            status: o.status,
            total_price: o.total_price,
            prepare_duration: o.prepare_duration,
            ordered_at: o.ordered_at,
            confirmed_at: o.confirmed_at,
            preparing_at: o.preparing_at,
            delivered_at: o.delivered_at,
            estimated_ready_at: o.estimated_ready_at(),
            audit: OrderAudit {
                confirmed_by: o.confirmed_by,
                prepared_by: o.prepared_by,
                delivered_by: o.delivered_by,
                cancelled_by: o.cancelled_by,
                refunded_by: o.refunded_by,
            },
            items: lines.remove(&o.id).unwrap_or_default(),
            payment: payments.get(&o.id).map(PaymentSummary::from),
        })
        .collect())
}

pub(crate) async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
) -> Result<OrderDetail, ServiceError> {
    load_details(conn, vec![order])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::InternalError("order detail went missing".to_string()))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The caller's own orders for one tab, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: i32,
        view: OrderView,
        page: PageRequest,
    ) -> Result<Page<OrderDetail>, ServiceError> {
        let db = &*self.db;
        let paginator = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::Status.is_in(view.statuses().iter().copied()))
            .order_by_desc(order::Column::OrderedAt)
            .order_by_desc(order::Column::Id)
            .paginate(db, page.per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(load_details(db, orders).await?, page, total))
    }

    /// One order. Customers may only see their own.
    pub async fn get_order(&self, actor: &AuthUser, order_id: i32) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let may_view = order.user_id == actor.user_id || actor.has_permission(perm::VIEW_ORDERS);
        if !may_view {
            return Err(ServiceError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        load_detail(db, order).await
    }

    /// Staff listing across all customers.
    #[instrument(skip(self, filter))]
    pub async fn list_all(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<Page<OrderDetail>, ServiceError> {
        let db = &*self.db;
        let mut query = order::Entity::find();

        if let Some(raw) = filter.status.as_deref().map(str::trim) {
            if !raw.is_empty() && !raw.eq_ignore_ascii_case("all") {
                query = query.filter(order::Column::Status.eq(parse_status(raw)?));
            }
        }
        if let Some(start) = filter.start_date {
            query = query.filter(order::Column::OrderedAt.gte(day_start(start)));
        }
        if let Some(end) = filter.end_date {
            if let Some(next) = end.succ_opt() {
                query = query.filter(order::Column::OrderedAt.lt(day_start(next)));
            }
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let mut any = Condition::any()
                .add(user::Column::Username.contains(search))
                .add(user::Column::FullName.contains(search));
            if let Ok(id) = search.trim_start_matches('#').parse::<i32>() {
                any = any.add(order::Column::Id.eq(id));
            }
            query = query.inner_join(user::Entity).filter(any);
        }

        let paginator = query
            .order_by_desc(order::Column::OrderedAt)
            .order_by_desc(order::Column::Id)
            .paginate(db, page.per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.index()).await?;
        Ok(Page::new(load_details(db, orders).await?, page, total))
    }

    /// Moves an order to a new status on behalf of a staff member.
    #[instrument(skip(self, actor, request), fields(actor_id = actor.user_id, role = %actor.role, status = %request.status))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        order_id: i32,
        request: StatusUpdate,
    ) -> Result<OrderDetail, ServiceError> {
        let target = parse_status(&request.status)?;
        if !actor.has_permission(perm::MANAGE_ORDERS) || !rbac::can_set_status(actor.role, target)
        {
            warn!(%target, "status change refused for role");
            return Err(ServiceError::Forbidden(format!(
                "Role {} may not set orders to {}",
                actor.role, target
            )));
        }

        let txn = self.db.begin().await?;
        let order = order::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let transition = check_transition(order.status, target)?;
        let prepare_duration = match target {
            OrderStatus::Preparing => Some(validate_prepare_duration(request.prepare_duration)?),
            _ => None,
        };

        if transition == Transition::Unchanged && prepare_duration.is_none() {
            let detail = load_detail(&txn, order).await?;
            txn.commit().await?;
            return Ok(detail);
        }

        let now = Utc::now();
        let previous = order.status;
        let mut active: order::ActiveModel = order.clone().into();
        if transition == Transition::Advance {
            active.status = Set(target);
            let by = Set(Some(actor.user_id));
            match target {
                OrderStatus::Confirmed => {
                    if order.confirmed_at.is_none() {
                        active.confirmed_at = Set(Some(now));
                    }
                    active.confirmed_by = by;
                }
                OrderStatus::Preparing => {
                    if order.preparing_at.is_none() {
                        active.preparing_at = Set(Some(now));
                    }
                    active.prepared_by = by;
                }
                OrderStatus::Delivered => {
                    if order.delivered_at.is_none() {
                        active.delivered_at = Set(Some(now));
                    }
                    active.delivered_by = by;
                }
                OrderStatus::Cancelled => active.cancelled_by = by,
                OrderStatus::Refunded => active.refunded_by = by,
                OrderStatus::Pending => {}
            }
        }
        if let Some(minutes) = prepare_duration {
            active.prepare_duration = Set(Some(minutes));
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        if target == OrderStatus::Refunded && transition == Transition::Advance {
            let payment = payment::Entity::find()
                .filter(payment::Column::OrderId.eq(updated.id))
                .lock_exclusive()
                .one(&txn)
                .await?;
            match payment {
                Some(p) if p.status == PaymentStatus::Paid => {
                    refund_payment(&txn, &updated, p).await?;
                }
                Some(p) => {
                    info!(payment_id = p.id, status = %p.status, "no settled payment to return");
                }
                None => warn!(order_id = updated.id, "refunded order has no payment row"),
            }
        }

        if target.is_terminal() {
            refresh_user_counters(&txn, updated.user_id).await?;
        }
        if let Some(table_id) = updated.table_id {
            refresh_occupancy(&txn, table_id).await?;
        }

        let detail = load_detail(&txn, updated).await?;
        txn.commit().await?;

        info!(order_id, from = %previous, to = %target, "order status updated");
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_views_partition_statuses() {
        let mut seen: Vec<OrderStatus> = [OrderView::Current, OrderView::History, OrderView::Cancelled]
            .iter()
            .flat_map(|v| v.statuses().iter().copied())
            .collect();
        seen.sort_by_key(|s| s.to_string());
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn date_filter_starts_at_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        assert_eq!(day_start(date).to_rfc3339(), "2024-10-01T00:00:00+00:00");
    }
}
