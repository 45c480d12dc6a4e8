//! Staff payment overrides: confirming counter and QR payments, the legacy
//! `fake` alias, refunds and listing filters.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, Actor, MultipartForm, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use canteen_api::entities::{order::OrderStatus, payment::PaymentStatus, user::Role};

async fn place_order(app: &TestApp, customer: &Actor, method: &str, table_number: i32) -> i32 {
    let tea = app.seed_product("Masala Tea", dec!(25.00)).await;
    let table = app.seed_table(table_number, 10).await;
    app.add_to_cart(customer, tea.id, 2).await;
    let response = app
        .checkout(customer, MultipartForm::order(method, "50", table.id))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"]["order"]["id"]
        .as_i64()
        .expect("order id") as i32
}

#[tokio::test]
async fn admin_confirms_counter_payment() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", Decimal::ZERO).await;
    let order_id = place_order(&app, &customer, "counter", 1).await;

    let response = app.set_payment_status(&admin, order_id, "paid").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "paid");

    let payment = app.payment_for(order_id).await;
    assert_eq!(payment.status, PaymentStatus::Paid);
    let paid_at = payment.paid_at.expect("paid_at set");

    // Same status again is a no-op and keeps the original timestamp.
    let again = app.set_payment_status(&admin, order_id, "paid").await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(app.payment_for(order_id).await.paid_at, Some(paid_at));
}

#[tokio::test]
async fn fake_is_recorded_as_failed() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", Decimal::ZERO).await;
    let order_id = place_order(&app, &customer, "counter", 1).await;

    let response = app.set_payment_status(&admin, order_id, "fake").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.payment_for(order_id).await.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn invalid_or_missing_targets_are_rejected() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", Decimal::ZERO).await;
    let order_id = place_order(&app, &customer, "counter", 1).await;

    let invalid = app.set_payment_status(&admin, order_id, "maybe").await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let missing = app.set_payment_status(&admin, 9_999, "paid").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(response_json(missing).await["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Order not found"));
}

#[tokio::test]
async fn only_payment_managers_may_override() {
    let app = TestApp::new().await;
    let cashier = app.actor("cashier", Role::Cashier, Decimal::ZERO).await;
    let customer = app.customer("asha", Decimal::ZERO).await;
    let order_id = place_order(&app, &customer, "counter", 1).await;

    let response = app.set_payment_status(&cashier, order_id, "paid").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.payment_for(order_id).await.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn wallet_refund_through_payment_override_is_final() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", dec!(100.00)).await;
    let order_id = place_order(&app, &customer, "wallet", 1).await;
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(50.00));

    // A settled wallet payment cannot be walked back to pending.
    let walk_back = app.set_payment_status(&admin, order_id, "pending").await;
    assert_eq!(walk_back.status(), StatusCode::BAD_REQUEST);

    let refund = app.set_payment_status(&admin, order_id, "refunded").await;
    assert_eq!(refund.status(), StatusCode::OK);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100.00));

    let twice = app.set_payment_status(&admin, order_id, "refunded").await;
    assert_eq!(twice.status(), StatusCode::BAD_REQUEST);
    assert!(response_json(twice).await["message"]
        .as_str()
        .unwrap_or_default()
        .contains("already been refunded"));
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100.00));
}

#[tokio::test]
async fn payment_refund_closes_the_order() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", dec!(100.00)).await;
    let order_id = place_order(&app, &customer, "wallet", 1).await;
    assert_eq!(app.user(customer.id()).await.total_spent, dec!(50.00));

    let refund = app.set_payment_status(&admin, order_id, "refunded").await;
    assert_eq!(refund.status(), StatusCode::OK);

    let order = app.order(order_id).await;
    assert_eq!(order.status, OrderStatus::Refunded);
    assert_eq!(order.refunded_by, Some(admin.id()));
    assert_eq!(app.user(customer.id()).await.total_spent, dec!(0));
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100.00));

    // The order cannot be worked on after its money went back.
    let confirm = app
        .set_status(&admin, order_id, json!({ "status": "confirmed" }))
        .await;
    assert_eq!(confirm.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.order(order_id).await.status, OrderStatus::Refunded);
}

#[tokio::test]
async fn cancelled_wallet_order_can_still_be_refunded() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", dec!(100.00)).await;
    let order_id = place_order(&app, &customer, "wallet", 1).await;

    let cancel = app
        .set_status(&admin, order_id, json!({ "status": "cancelled" }))
        .await;
    assert_eq!(cancel.status(), StatusCode::OK);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(50.00));

    let refund = app.set_payment_status(&admin, order_id, "refunded").await;
    assert_eq!(refund.status(), StatusCode::OK);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(100.00));
    assert_eq!(app.order(order_id).await.status, OrderStatus::Cancelled);
    assert_eq!(app.payment_for(order_id).await.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn refunding_unpaid_counter_payment_moves_no_money() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let customer = app.customer("asha", dec!(10.00)).await;
    let order_id = place_order(&app, &customer, "counter", 1).await;

    let response = app.set_payment_status(&admin, order_id, "refunded").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.wallet_of(customer.id()).await.balance, dec!(10.00));
}

#[tokio::test]
async fn payment_list_filters_by_status_and_method() {
    let app = TestApp::new().await;
    let admin = app.actor("admin", Role::Admin, Decimal::ZERO).await;
    let asha = app.customer("asha", dec!(100.00)).await;
    let bikash = app.customer("bikash", Decimal::ZERO).await;
    place_order(&app, &asha, "wallet", 1).await;
    place_order(&app, &bikash, "counter", 2).await;

    let pending = app
        .request(
            Method::GET,
            "/api/v1/admin/payments?status=pending",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(pending.status(), StatusCode::OK);
    let body = response_json(pending).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["method"], "counter");

    let wallet = app
        .request(
            Method::GET,
            "/api/v1/admin/payments?method=wallet&search=asha",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(response_json(wallet).await["data"]["total"], 1);
}
