//! Per-user cart.
//!
//! Lines are unique per (cart, product); adding a product that is already in
//! the cart bumps the quantity and keeps the original price snapshot.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::entities::{cart, cart_item, product};
use crate::errors::ServiceError;

pub const MAX_LINE_QUANTITY: i32 = 50;

/// Accepts a line quantity in `1..=MAX_LINE_QUANTITY`.
pub fn check_line_quantity(quantity: i32) -> Result<i32, ServiceError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(quantity)
    } else {
        Err(ServiceError::ValidationError(format!(
            "Quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartLine {
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: i32,
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total_price: Decimal,
    /// False when the product was withdrawn after it was added; checkout
    /// refuses carts holding such lines.
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: Option<i32>,
    pub items: Vec<CartLine>,
    pub item_count: i32,
    pub total: Decimal,
}

impl CartView {
    fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            item_count: 0,
            total: Decimal::ZERO,
        }
    }
}

/// Sum of `quantity * price` over the snapshot prices.
pub fn cart_total(items: &[cart_item::Model]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

pub(crate) async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<Option<cart::Model>, ServiceError> {
    Ok(cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = find_cart(conn, user_id).await? {
        return Ok(existing);
    }
    let now = Utc::now();
    let created = cart::ActiveModel {
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    debug!(user_id, cart_id = created.id, "cart created");
    Ok(created)
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn view(&self, user_id: i32) -> Result<CartView, ServiceError> {
        match find_cart(&*self.db, user_id).await? {
            Some(cart) => load_view(&*self.db, &cart).await,
            None => Ok(CartView::empty()),
        }
    }

    #[instrument(skip(self, request), fields(product_id = request.product_id, quantity = request.quantity))]
    pub async fn add_item(&self, user_id: i32, request: AddToCart) -> Result<CartView, ServiceError> {
        check_line_quantity(request.quantity)?;

        let txn = self.db.begin().await?;
        let product = product::Entity::find_by_id(request.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "{} is not available right now",
                product.name
            )));
        }

        let cart = get_or_create_cart(&txn, user_id).await?;
        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let quantity = check_line_quantity(line.quantity + request.quantity)?;
                let price = line.price;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.total_price = Set(price * Decimal::from(quantity));
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(request.quantity),
                    price: Set(product.price),
                    total_price: Set(product.price * Decimal::from(request.quantity)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        user_id: i32,
        product_id: i32,
        request: UpdateCartLine,
    ) -> Result<CartView, ServiceError> {
        check_line_quantity(request.quantity)?;

        let txn = self.db.begin().await?;
        let (cart, line) = find_line(&txn, user_id, product_id).await?;
        let price = line.price;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(request.quantity);
        active.total_price = Set(price * Decimal::from(request.quantity));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: i32, product_id: i32) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, line) = find_line(&txn, user_id, product_id).await?;
        line.delete(&txn).await?;

        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;
        Ok(view)
    }
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    product_id: i32,
) -> Result<(cart::Model, cart_item::Model), ServiceError> {
    let not_in_cart = || ServiceError::NotFound(format!("Product {product_id} is not in the cart"));
    let cart = find_cart(conn, user_id).await?.ok_or_else(not_in_cart)?;
    let line = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or_else(not_in_cart)?;
    Ok((cart, line))
}

async fn load_view<C: ConnectionTrait>(conn: &C, cart: &cart::Model) -> Result<CartView, ServiceError> {
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(product::Entity)
        .order_by_asc(cart_item::Column::Id)
        .all(conn)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut total = Decimal::ZERO;
    let mut item_count = 0;
    for (line, product) in rows {
        let line_total = line.price * Decimal::from(line.quantity);
        total += line_total;
        item_count += line.quantity;
        items.push(CartLine {
            id: line.id,
            product_id: line.product_id,
            product_name: product
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            quantity: line.quantity,
            price: line.price,
            total_price: line_total,
            available: product.map(|p| p.is_active).unwrap_or(false),
        });
    }

    Ok(CartView {
        cart_id: Some(cart.id),
        items,
        item_count,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, price: Decimal) -> cart_item::Model {
        let now = Utc::now();
        cart_item::Model {
            id: 1,
            cart_id: 1,
            product_id: 1,
            quantity,
            price,
            total_price: price * Decimal::from(quantity),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn total_uses_snapshot_prices() {
        let items = vec![line(2, dec!(120)), line(1, dec!(60.50))];
        assert_eq!(cart_total(&items), dec!(300.50));
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn line_quantity_bounds_follow_the_cap() {
        assert_eq!(check_line_quantity(1).unwrap(), 1);
        assert_eq!(check_line_quantity(MAX_LINE_QUANTITY).unwrap(), MAX_LINE_QUANTITY);
        assert!(check_line_quantity(0).is_err());
        assert!(check_line_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }
}
