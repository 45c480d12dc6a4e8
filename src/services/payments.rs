//! Payment settlement after checkout.
//!
//! Wallet payments settle at checkout; QR and counter payments wait for staff
//! to confirm them here. Refunding a settled wallet payment is the only place
//! money flows back into a wallet, and it happens through [`refund_payment`]
//! exactly once per payment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Condition, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::{perm, AuthUser};
use crate::entities::order::{self, OrderStatus};
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::payment_method::PaymentMethodKind;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::services::order_status::check_transition;
use crate::services::orders::{refresh_user_counters, PaymentSummary};
use crate::services::tables::refresh_occupancy;
use crate::services::wallet::{credit, lock_wallet, LedgerEntry};
use crate::services::{Page, PageRequest};

/// Returns a settled payment to the customer.
///
/// The caller must hold the payment row and pass a payment whose status is
/// `paid`. Wallet payments credit the order total back to the payer's wallet;
/// other methods were settled outside the system and only change status.
pub(crate) async fn refund_payment<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    payment: payment::Model,
) -> Result<payment::Model, ServiceError> {
    if payment.status != PaymentStatus::Paid {
        return Err(ServiceError::InvalidOperation(format!(
            "Only paid payments can be refunded; this one is {}",
            payment.status
        )));
    }

    if payment.method == PaymentMethodKind::Wallet && !order.total_price.is_zero() {
        let wallet = lock_wallet(conn, payment.user_id).await?;
        let updated = credit(
            conn,
            &wallet,
            order.total_price,
            LedgerEntry::new(format!("Refund for order #{}", order.id)),
        )
        .await?;
        info!(
            order_id = order.id,
            amount = %order.total_price,
            balance = %updated.balance,
            "wallet refunded"
        );
    }

    let mut active: payment::ActiveModel = payment.into();
    active.status = Set(PaymentStatus::Refunded);
    active.updated_at = Set(Utc::now());
    Ok(active.update(conn).await?)
}

/// Moves a still-live order to `refunded` alongside its payment.
///
/// Cancelled and refunded orders already count for nothing and are left as
/// they are.
async fn close_refunded_order<C: ConnectionTrait>(
    conn: &C,
    actor: &AuthUser,
    order: order::Model,
) -> Result<(), ServiceError> {
    if order.status.is_terminal() {
        return Ok(());
    }
    check_transition(order.status, OrderStatus::Refunded)?;

    let (user_id, table_id) = (order.user_id, order.table_id);
    let mut active: order::ActiveModel = order.into();
    active.status = Set(OrderStatus::Refunded);
    active.refunded_by = Set(Some(actor.user_id));
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    refresh_user_counters(conn, user_id).await?;
    if let Some(table_id) = table_id {
        refresh_occupancy(conn, table_id).await?;
    }
    Ok(())
}

pub fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ServiceError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<PaymentStatus>()
        .map_err(|_| ServiceError::InvalidStatus("Invalid payment status".to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<String>,
    pub method: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRow {
    pub id: i32,
    pub transaction_id: String,
    pub order_id: i32,
    pub user_id: i32,
    pub customer: String,
    pub method: PaymentMethodKind,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub screenshot: Option<String>,
    pub remarks: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn filter_value(raw: &Option<String>) -> Option<&str> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, filter))]
    pub async fn list(
        &self,
        filter: PaymentFilter,
        page: PageRequest,
    ) -> Result<Page<PaymentRow>, ServiceError> {
        let db = &*self.db;
        let mut query = payment::Entity::find().find_also_related(user::Entity);

        if let Some(status) = filter_value(&filter.status) {
            query = query.filter(payment::Column::Status.eq(parse_payment_status(status)?));
        }
        if let Some(method) = filter_value(&filter.method) {
            let method = method
                .to_ascii_lowercase()
                .parse::<PaymentMethodKind>()
                .map_err(|_| ServiceError::ValidationError("Invalid payment method".to_string()))?;
            query = query.filter(payment::Column::Method.eq(method));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let mut any = Condition::any()
                .add(user::Column::Username.contains(search))
                .add(user::Column::FullName.contains(search));
            let numeric = search
                .trim_start_matches('#')
                .trim_start_matches("TXN")
                .parse::<i32>();
            if let Ok(id) = numeric {
                any = any
                    .add(payment::Column::Id.eq(id))
                    .add(payment::Column::OrderId.eq(id));
            }
            query = query.filter(any);
        }

        let paginator = query
            .order_by_desc(payment::Column::CreatedAt)
            .order_by_desc(payment::Column::Id)
            .paginate(db, page.per_page);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;

        let items = rows
            .into_iter()
            .map(|(p, u)| PaymentRow {
                transaction_id: p.transaction_id(),
                customer: u.map(|u| u.display_name().to_string()).unwrap_or_default(),
                id: p.id,
                order_id: p.order_id,
                user_id: p.user_id,
                method: p.method,
                amount: p.amount,
                status: p.status,
                screenshot: p.screenshot,
                remarks: p.remarks,
                paid_at: p.paid_at,
                created_at: p.created_at,
            })
            .collect();
        Ok(Page::new(items, page, total))
    }

    /// Staff override of an order's payment status.
    ///
    /// A refunded payment is final. Moving a paid payment to `refunded` goes
    /// through [`refund_payment`], so a wallet payment is credited back once,
    /// and a live order is refunded with it in the same transaction.
    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        order_id: i32,
        status: &str,
    ) -> Result<PaymentSummary, ServiceError> {
        if !actor.has_permission(perm::MANAGE_PAYMENTS) {
            return Err(ServiceError::Forbidden(
                "Only administrators can change payment status".to_string(),
            ));
        }
        let target = parse_payment_status(status)?;

        let txn = self.db.begin().await?;
        let order = order::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        let payment = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order.id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Payment details not found for this order".to_string())
            })?;

        if payment.status == PaymentStatus::Refunded {
            return Err(ServiceError::InvalidOperation(
                "Payment has already been refunded".to_string(),
            ));
        }
        if payment.status == target {
            txn.commit().await?;
            return Ok(PaymentSummary::from(&payment));
        }

        let previous = payment.status;
        let updated = match target {
            PaymentStatus::Refunded => {
                let refunded = refund_payment(&txn, &order, payment).await?;
                close_refunded_order(&txn, actor, order).await?;
                refunded
            }
            _ if payment.method == PaymentMethodKind::Wallet && previous == PaymentStatus::Paid => {
                return Err(ServiceError::InvalidOperation(
                    "Settled wallet payments can only be refunded".to_string(),
                ));
            }
            _ => {
                let now = Utc::now();
                let first_paid = target == PaymentStatus::Paid && payment.paid_at.is_none();
                let mut active: payment::ActiveModel = payment.into();
                active.status = Set(target);
                if first_paid {
                    active.paid_at = Set(Some(now));
                }
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
        };
        txn.commit().await?;

        info!(order_id, from = %previous, to = %target, "payment status updated");
        Ok(PaymentSummary::from(&updated))
    }
}
