//! Checkout: turns the caller's cart into an order and its payment.
//!
//! All checks run before the first write. A wallet payment must be exactly
//! the order total, so the debit, its ledger row and any later refund agree. The writes (order, items, payment,
//! wallet debit, cart drain, counters, table occupancy) share one transaction,
//! so a failure at any point leaves every row as it was. A screenshot written
//! to disk for a QR payment is removed again if the transaction does not
//! commit.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::entities::order::{self, OrderStatus};
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::payment_method::{self, PaymentMethodKind};
use crate::entities::{cart, cart_item, order_item, product};
use crate::errors::ServiceError;
use crate::services::cart::cart_total;
use crate::services::orders::{load_detail, refresh_user_counters, OrderDetail};
use crate::services::tables::{lock_table, occupancy, refresh_occupancy, table_activity};
use crate::services::uploads::{ScreenshotStore, StoredFile, Upload};
use crate::services::wallet::{debit, lock_wallet, LedgerEntry};

pub const COUNTER_REMARK: &str = "Paid on counter - Awaiting admin confirmation.";

/// Raw checkout form as submitted by the client. Every field is optional here
/// so that missing fields can be reported together.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub method: Option<String>,
    pub amount: Option<String>,
    pub table_id: Option<String>,
    pub remarks: Option<String>,
    pub screenshot: Option<Upload>,
}

/// A parsed, well-formed checkout request.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub method: String,
    pub amount: Decimal,
    pub table_id: i32,
    pub remarks: Option<String>,
    pub screenshot: Option<Upload>,
}

impl CheckoutForm {
    pub fn parse(self) -> Result<CheckoutRequest, ServiceError> {
        let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let method = present(self.method);
        let amount = present(self.amount);
        let table_id = present(self.table_id);

        let missing: Vec<&str> = [
            ("method", method.is_none()),
            ("amount", amount.is_none()),
            ("table_id", table_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        let (Some(method), Some(amount), Some(table_id)) = (method, amount, table_id) else {
            return Err(ServiceError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let amount = Decimal::from_str(&amount)
            .map_err(|_| ServiceError::ValidationError("amount must be a decimal number".to_string()))?;
        if amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount cannot be negative".to_string(),
            ));
        }
        let table_id = table_id
            .parse::<i32>()
            .map_err(|_| ServiceError::ValidationError("table_id must be an integer".to_string()))?;

        Ok(CheckoutRequest {
            method,
            amount,
            table_id,
            remarks: present(self.remarks),
            screenshot: self.screenshot,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub message: String,
    pub order: OrderDetail,
    /// Wallet balance after the debit, for wallet payments.
    pub wallet_balance: Option<Decimal>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    screenshots: ScreenshotStore,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, screenshots: ScreenshotStore) -> Self {
        Self { db, screenshots }
    }

    #[instrument(skip(self, form))]
    pub async fn checkout(&self, user_id: i32, form: CheckoutForm) -> Result<CheckoutReceipt, ServiceError> {
        let request = form.parse()?;
        let txn = self.db.begin().await?;

        // Table: must exist and have a free seat unless the caller already holds one.
        let table = lock_table(&txn, request.table_id).await?;
        let activity = table_activity(&txn, table.id).await?;
        if occupancy(activity.seats_taken(), table.capacity)
            && !activity.customers.contains(&user_id)
        {
            return Err(ServiceError::InvalidOperation(format!(
                "Table {} is already occupied",
                table.number
            )));
        }

        // Payment method: known and enabled.
        let method = PaymentMethodKind::from_str(&request.method.to_ascii_lowercase())
            .map_err(|_| ServiceError::ValidationError("Invalid payment method".to_string()))?;
        let enabled = payment_method::Entity::find()
            .filter(payment_method::Column::Name.eq(method))
            .one(&txn)
            .await?
            .map(|m| m.is_enabled)
            .unwrap_or(false);
        if !enabled {
            return Err(ServiceError::ValidationError(format!(
                "Payment method {method} is not available"
            )));
        }
        if method == PaymentMethodKind::Qr {
            match &request.screenshot {
                Some(upload) => {
                    self.screenshots.validate(upload)?;
                }
                None => {
                    return Err(ServiceError::ValidationError(
                        "Screenshot is required for QR payments".to_string(),
                    ))
                }
            }
        }

        // Cart: locked for the rest of the transaction so a parallel checkout
        // by the same user cannot spend it twice.
        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::ValidationError("Cart is empty".to_string()))?;
        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(product::Entity)
            .order_by_asc(cart_item::Column::Id)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }
        for (line, product) in &lines {
            match product {
                Some(p) if p.is_active => {}
                Some(p) => {
                    return Err(ServiceError::InvalidOperation(format!(
                        "{} is no longer available; remove it from the cart",
                        p.name
                    )))
                }
                None => {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Product {} is no longer available; remove it from the cart",
                        line.product_id
                    )))
                }
            }
        }

        let items: Vec<cart_item::Model> = lines.iter().map(|(line, _)| line.clone()).collect();
        let total = cart_total(&items);
        if request.amount < total {
            return Err(ServiceError::ValidationError(format!(
                "Amount {} is less than the order total {}",
                request.amount, total
            )));
        }

        let wallet = match method {
            PaymentMethodKind::Wallet => {
                // The debit, the ledger row and the refund all use one figure.
                if request.amount != total {
                    return Err(ServiceError::ValidationError(format!(
                        "Wallet payments must be exactly the order total {total}"
                    )));
                }
                let wallet = lock_wallet(&txn, user_id).await?;
                if wallet.balance < request.amount {
                    return Err(ServiceError::InsufficientBalance);
                }
                Some(wallet)
            }
            _ => None,
        };

        // Every check passed; the screenshot is the only write outside the
        // transaction.
        let stored = match (&request.screenshot, method) {
            (Some(upload), PaymentMethodKind::Qr) => Some(self.screenshots.store(upload).await?),
            _ => None,
        };

        let description = lines
            .iter()
            .map(|(line, product)| {
                let name = product.as_ref().map(|p| p.name.as_str()).unwrap_or("item");
                format!("{} x {}", line.quantity, name)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let plan = Settlement {
            user_id,
            table_id: table.id,
            method,
            amount: request.amount,
            total,
            remarks: request.remarks,
            screenshot: stored.as_ref().map(|s| s.relative_path.clone()),
            description,
        };

        match self.persist(txn, plan, &cart, &items, wallet).await {
            Ok(receipt) => {
                info!(
                    order_id = receipt.order.id,
                    %method,
                    total = %receipt.order.total_price,
                    "checkout completed"
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Some(file) = stored.as_ref() {
                    self.discard(file).await;
                }
                Err(e)
            }
        }
    }

    async fn discard(&self, file: &StoredFile) {
        warn!(path = %file.relative_path, "checkout failed after storing screenshot");
        self.screenshots.discard(file).await;
    }

    async fn persist(
        &self,
        txn: DatabaseTransaction,
        plan: Settlement,
        cart: &cart::Model,
        items: &[cart_item::Model],
        wallet: Option<crate::entities::wallet::Model>,
    ) -> Result<CheckoutReceipt, ServiceError> {
        let now = Utc::now();

        let order = order::ActiveModel {
            user_id: Set(plan.user_id),
            table_id: Set(Some(plan.table_id)),
            status: Set(OrderStatus::Pending),
            total_price: Set(plan.total),
            ordered_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for item in items {
            order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(Some(item.product_id)),
                quantity: Set(item.quantity),
                price: Set(item.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        let mut wallet_balance = None;
        let (status, amount, remarks, paid_at) = match plan.method {
            PaymentMethodKind::Wallet => {
                let wallet = wallet.ok_or_else(|| {
                    ServiceError::InternalError("wallet was not loaded for wallet checkout".to_string())
                })?;
                // A free order settles without touching the ledger.
                let balance = if plan.amount.is_zero() {
                    wallet.balance
                } else {
                    let entry = LedgerEntry::new(format!("Order #{} payment", order.id))
                        .with_description(plan.description.clone());
                    debit(&txn, &wallet, plan.amount, entry).await?.balance
                };
                wallet_balance = Some(balance);
                (
                    PaymentStatus::Paid,
                    plan.amount,
                    plan.remarks.unwrap_or_default(),
                    Some(now),
                )
            }
            PaymentMethodKind::Qr => (
                PaymentStatus::Pending,
                plan.amount,
                plan.remarks.unwrap_or_default(),
                None,
            ),
            PaymentMethodKind::Counter => (
                PaymentStatus::Pending,
                plan.amount,
                COUNTER_REMARK.to_string(),
                None,
            ),
        };

        payment::ActiveModel {
            order_id: Set(order.id),
            user_id: Set(plan.user_id),
            method: Set(plan.method),
            amount: Set(amount),
            status: Set(status),
            screenshot: Set(plan.screenshot),
            remarks: Set(remarks),
            paid_at: Set(paid_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        refresh_user_counters(&txn, plan.user_id).await?;
        refresh_occupancy(&txn, plan.table_id).await?;

        let detail = load_detail(&txn, order).await?;
        txn.commit().await?;

        Ok(CheckoutReceipt {
            message: match plan.method {
                PaymentMethodKind::Wallet => "Payment successful via wallet".to_string(),
                PaymentMethodKind::Qr => "QR payment submitted. Awaiting admin approval.".to_string(),
                PaymentMethodKind::Counter => {
                    "Counter payment recorded. Please pay at the counter.".to_string()
                }
            },
            order: detail,
            wallet_balance,
        })
    }
}

/// Everything [`CheckoutService::persist`] needs once validation is done.
struct Settlement {
    user_id: i32,
    table_id: i32,
    method: PaymentMethodKind,
    amount: Decimal,
    total: Decimal,
    remarks: Option<String>,
    screenshot: Option<String>,
    description: String,
}
