//! Integration tests for the checkout flow.
//!
//! Tests cover:
//! - Wallet checkout debits exactly the order total once, and only that amount
//! - Insufficient balance, short amounts and missing screenshots leave no trace
//! - QR and counter payments stay pending
//! - Table lookup and occupancy at checkout

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, MultipartForm, TestApp, PNG_BYTES};
use rust_decimal_macros::dec;

use canteen_api::entities::{
    order::OrderStatus,
    payment::PaymentStatus,
    payment_method::PaymentMethodKind,
    transaction_history::TransactionType,
};
use canteen_api::services::checkout::COUNTER_REMARK;

#[tokio::test]
async fn wallet_checkout_debits_total_and_clears_cart() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(500.00)).await;
    let momo = app.seed_product("Chicken Momo", dec!(150.00)).await;
    let table = app.seed_table(1, 1).await;

    let added = app.add_to_cart(&customer, momo.id, 2).await;
    assert_eq!(added.status(), StatusCode::OK);

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "300", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["message"], "Payment successful via wallet");
    let order_id = body["data"]["order"]["id"].as_i64().expect("order id") as i32;

    let order = app.order(order_id).await;
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_price, dec!(300.00));
    assert_eq!(order.table_id, Some(table.id));

    let payment = app.payment_for(order_id).await;
    assert_eq!(payment.method, PaymentMethodKind::Wallet);
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.amount, dec!(300.00));
    assert!(payment.paid_at.is_some());

    let wallet = app.wallet_of(customer.id()).await;
    assert_eq!(wallet.balance, dec!(200.00));
    let debits: Vec<_> = app
        .ledger_of(wallet.id)
        .await
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Debit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount, dec!(300.00));

    let cart = app
        .request(Method::GET, "/api/v1/cart", None, Some(&customer.token))
        .await;
    let cart = response_json(cart).await;
    assert_eq!(cart["data"]["item_count"], 0);

    let user = app.user(customer.id()).await;
    assert_eq!(user.orders_count, 1);
    assert_eq!(user.total_spent, dec!(300.00));

    // One customer fills the single seat.
    assert!(app.table(table.id).await.is_occupied);
}

#[tokio::test]
async fn second_checkout_without_funds_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(500.00)).await;
    let momo = app.seed_product("Chicken Momo", dec!(150.00)).await;
    let table = app.seed_table(1, 4).await;

    app.add_to_cart(&customer, momo.id, 2).await;
    let first = app
        .checkout(&customer, MultipartForm::order("wallet", "300", table.id))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    app.add_to_cart(&customer, momo.id, 2).await;
    let second = app
        .checkout(&customer, MultipartForm::order("wallet", "300", table.id))
        .await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body = response_json(second).await;
    assert_eq!(body["message"], "Insufficient wallet balance");

    assert_eq!(app.orders_of(customer.id()).await.len(), 1);
    let wallet = app.wallet_of(customer.id()).await;
    assert_eq!(wallet.balance, dec!(200.00));

    // The cart survives a failed checkout.
    let cart = app
        .request(Method::GET, "/api/v1/cart", None, Some(&customer.token))
        .await;
    assert_eq!(response_json(cart).await["data"]["item_count"], 2);
}

#[tokio::test]
async fn qr_checkout_requires_screenshot() {
    let app = TestApp::new().await;
    let customer = app.customer("bikash", dec!(0)).await;
    let lassi = app.seed_product("Lassi", dec!(60.00)).await;
    let table = app.seed_table(2, 2).await;
    app.add_to_cart(&customer, lassi.id, 1).await;

    let response = app
        .checkout(&customer, MultipartForm::order("qr", "60", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.orders_of(customer.id()).await.is_empty());
    assert!(!app.table(table.id).await.is_occupied);
}

#[tokio::test]
async fn qr_checkout_stores_screenshot_and_waits_for_approval() {
    let app = TestApp::new().await;
    let customer = app.customer("bikash", dec!(0)).await;
    let lassi = app.seed_product("Lassi", dec!(60.00)).await;
    let table = app.seed_table(2, 2).await;
    app.add_to_cart(&customer, lassi.id, 1).await;

    let form = MultipartForm::order("qr", "70", table.id)
        .text("remarks", "paid from phone")
        .file("screenshot", "proof.png", "image/png", PNG_BYTES);
    let response = app.checkout(&customer, form).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(
        body["data"]["message"],
        "QR payment submitted. Awaiting admin approval."
    );
    let order_id = body["data"]["order"]["id"].as_i64().expect("order id") as i32;

    let payment = app.payment_for(order_id).await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, dec!(70.00));
    assert_eq!(payment.remarks, "paid from phone");
    let stored = payment.screenshot.expect("screenshot path");
    assert!(app.upload_root().join(&stored).exists());

    // Nothing moved on the wallet.
    let wallet = app.wallet_of(customer.id()).await;
    assert_eq!(wallet.balance, dec!(0));
    assert!(app.ledger_of(wallet.id).await.is_empty());
}

#[tokio::test]
async fn counter_checkout_records_remark() {
    let app = TestApp::new().await;
    let customer = app.customer("bikash", dec!(0)).await;
    let tea = app.seed_product("Masala Tea", dec!(25.00)).await;
    let table = app.seed_table(3, 4).await;
    app.add_to_cart(&customer, tea.id, 2).await;

    let form = MultipartForm::order("counter", "50", table.id).text("remarks", "ignored");
    let response = app.checkout(&customer, form).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_i64().expect("order id") as i32;

    let payment = app.payment_for(order_id).await;
    assert_eq!(payment.method, PaymentMethodKind::Counter);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.remarks, COUNTER_REMARK);
}

#[tokio::test]
async fn short_amount_rolls_back() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(500.00)).await;
    let momo = app.seed_product("Chicken Momo", dec!(150.00)).await;
    let table = app.seed_table(1, 4).await;
    app.add_to_cart(&customer, momo.id, 2).await;

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "299.99", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.orders_of(customer.id()).await.is_empty());
    let wallet = app.wallet_of(customer.id()).await;
    assert_eq!(wallet.balance, dec!(500.00));
    assert_eq!(app.ledger_of(wallet.id).await.len(), 1, "only the opening balance");
}

#[tokio::test]
async fn wallet_amount_must_match_total() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(100.00)).await;
    let tea = app.seed_product("Masala Tea", dec!(25.00)).await;
    let table = app.seed_table(1, 4).await;
    app.add_to_cart(&customer, tea.id, 2).await;

    // More than the balance, more than the total.
    let over = app
        .checkout(&customer, MultipartForm::order("wallet", "150", table.id))
        .await;
    assert_eq!(over.status(), StatusCode::BAD_REQUEST);
    assert!(response_json(over).await["message"]
        .as_str()
        .unwrap_or_default()
        .contains("exactly the order total"));
    assert!(app.orders_of(customer.id()).await.is_empty());
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100.00));

    let exact = app
        .checkout(&customer, MultipartForm::order("wallet", "50.00", table.id))
        .await;
    assert_eq!(exact.status(), StatusCode::CREATED);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(50.00));
}

#[tokio::test]
async fn free_order_settles_without_ledger_entry() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(20.00)).await;
    let water = app.seed_product("Drinking Water", dec!(0.00)).await;
    let table = app.seed_table(1, 4).await;
    app.add_to_cart(&customer, water.id, 1).await;

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "0", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order_id = body["data"]["order"]["id"].as_i64().expect("order id") as i32;

    let payment = app.payment_for(order_id).await;
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.amount, dec!(0));
    let wallet = app.wallet_of(customer.id()).await;
    assert_eq!(wallet.balance, dec!(20.00));
    assert_eq!(app.ledger_of(wallet.id).await.len(), 1, "only the opening balance");
}

#[tokio::test]
async fn missing_fields_are_reported_together() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(10)).await;

    let response = app
        .checkout(&customer, MultipartForm::new().text("method", "wallet"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = response_json(response).await["message"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert!(message.contains("amount"));
    assert!(message.contains("table_id"));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(100)).await;
    let table = app.seed_table(1, 4).await;

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "10", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap_or_default().contains("Cart is empty"));
}

#[tokio::test]
async fn unknown_table_is_not_found() {
    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(100)).await;
    let tea = app.seed_product("Masala Tea", dec!(25.00)).await;
    app.add_to_cart(&customer, tea.id, 1).await;

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "25", 9_999))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.orders_of(customer.id()).await.is_empty());
}

#[tokio::test]
async fn full_table_turns_away_new_customers_only() {
    let app = TestApp::new().await;
    let first = app.customer("asha", dec!(100)).await;
    let second = app.customer("bikash", dec!(100)).await;
    let tea = app.seed_product("Masala Tea", dec!(25.00)).await;
    let table = app.seed_table(1, 1).await;

    app.add_to_cart(&first, tea.id, 1).await;
    let seated = app
        .checkout(&first, MultipartForm::order("wallet", "25", table.id))
        .await;
    assert_eq!(seated.status(), StatusCode::CREATED);
    assert!(app.table(table.id).await.is_occupied);

    app.add_to_cart(&second, tea.id, 1).await;
    let turned_away = app
        .checkout(&second, MultipartForm::order("wallet", "25", table.id))
        .await;
    assert_eq!(turned_away.status(), StatusCode::BAD_REQUEST);
    assert!(app.orders_of(second.id()).await.is_empty());

    // The seated customer can keep ordering at the same table.
    app.add_to_cart(&first, tea.id, 1).await;
    let again = app
        .checkout(&first, MultipartForm::order("wallet", "25", table.id))
        .await;
    assert_eq!(again.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn inactive_products_block_checkout() {
    use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};

    let app = TestApp::new().await;
    let customer = app.customer("asha", dec!(100)).await;
    let chowmein = app.seed_product("Veg Chowmein", dec!(40.00)).await;
    let table = app.seed_table(1, 4).await;
    app.add_to_cart(&customer, chowmein.id, 1).await;

    let mut retired = chowmein.into_active_model();
    retired.is_active = Set(false);
    retired.update(app.db()).await.expect("deactivate product");

    let response = app
        .checkout(&customer, MultipartForm::order("wallet", "40", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100));
}
