#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use canteen_api::{
    auth::AuthConfig,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{dining_table, order, payment, product, transaction_history, user, wallet},
    services::provisioning::{provision_user, NewAccount},
    AppState,
};

pub const BOUNDARY: &str = "canteen-test-boundary";

/// A seeded account and a bearer token for it.
pub struct Actor {
    pub user: user::Model,
    pub token: String,
}

impl Actor {
    pub fn id(&self) -> i32 {
        self.user.id
    }
}

/// Helper harness for an application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().expect("temp upload dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.upload_dir = uploads.path().to_string_lossy().into_owned();
        cfg.max_upload_bytes = 64 * 1024;

        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = canteen_api::build_router(state.clone());

        Self {
            router,
            state,
            _uploads: uploads,
        }
    }

    pub fn db(&self) -> &sea_orm::DatabaseConnection {
        &self.state.db
    }

    pub fn upload_root(&self) -> &std::path::Path {
        self._uploads.path()
    }

    /// Creates an account with a wallet and issues a token for it.
    pub async fn actor(&self, username: &str, role: user::Role, balance: Decimal) -> Actor {
        let account = provision_user(
            self.db(),
            NewAccount {
                username: username.to_string(),
                full_name: Some(format!("{username} test")),
                email: None,
                role,
                opening_balance: balance,
            },
        )
        .await
        .expect("provision test account");

        let token = canteen_api::auth::AuthService::new(AuthConfig::from(&self.state.config))
            .generate_token(&account.user)
            .expect("issue test token")
            .access_token;

        Actor {
            user: account.user,
            token,
        }
    }

    pub async fn customer(&self, username: &str, balance: Decimal) -> Actor {
        self.actor(username, user::Role::Customer, balance).await
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> product::Model {
        let now = chrono::Utc::now();
        product::ActiveModel {
            category_id: Set(None),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    pub async fn seed_table(&self, number: i32, capacity: i32) -> dining_table::Model {
        dining_table::ActiveModel {
            number: Set(number),
            capacity: Set(capacity),
            area: Set(None),
            is_occupied: Set(false),
            occupied_at: Set(None),
            estimated_finish: Set(None),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed table")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn add_to_cart(&self, actor: &Actor, product_id: i32, quantity: i32) -> Response {
        self.request(
            Method::POST,
            "/api/v1/cart/items",
            Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
            Some(&actor.token),
        )
        .await
    }

    /// Posts a multipart checkout form.
    pub async fn checkout(&self, actor: &Actor, form: MultipartForm) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/checkout")
            .header("authorization", format!("Bearer {}", actor.token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form.finish()))
            .expect("failed to build checkout request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during checkout")
    }

    pub async fn set_status(&self, actor: &Actor, order_id: i32, body: Value) -> Response {
        self.request(
            Method::POST,
            &format!("/api/v1/admin/orders/{order_id}/update-status"),
            Some(body),
            Some(&actor.token),
        )
        .await
    }

    pub async fn set_payment_status(&self, actor: &Actor, order_id: i32, status: &str) -> Response {
        self.request(
            Method::POST,
            &format!("/api/v1/admin/orders/{order_id}/update-payment-status"),
            Some(serde_json::json!({ "status": status })),
            Some(&actor.token),
        )
        .await
    }

    pub async fn wallet_of(&self, user_id: i32) -> wallet::Model {
        wallet::Entity::find()
            .filter(wallet::Column::UserId.eq(user_id))
            .one(self.db())
            .await
            .expect("wallet query")
            .expect("wallet exists")
    }

    pub async fn ledger_of(&self, wallet_id: i32) -> Vec<transaction_history::Model> {
        transaction_history::Entity::find()
            .filter(transaction_history::Column::WalletId.eq(wallet_id))
            .all(self.db())
            .await
            .expect("ledger query")
    }

    pub async fn orders_of(&self, user_id: i32) -> Vec<order::Model> {
        order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .all(self.db())
            .await
            .expect("order query")
    }

    pub async fn payment_for(&self, order_id: i32) -> payment::Model {
        payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(self.db())
            .await
            .expect("payment query")
            .expect("payment exists")
    }

    pub async fn order(&self, order_id: i32) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(self.db())
            .await
            .expect("order query")
            .expect("order exists")
    }

    pub async fn table(&self, table_id: i32) -> dining_table::Model {
        dining_table::Entity::find_by_id(table_id)
            .one(self.db())
            .await
            .expect("table query")
            .expect("table exists")
    }

    pub async fn user(&self, user_id: i32) -> user::Model {
        user::Entity::find_by_id(user_id)
            .one(self.db())
            .await
            .expect("user query")
            .expect("user exists")
    }
}

/// Minimal multipart/form-data body builder.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// `method`, `amount` and `table_id` in one go.
    pub fn order(method: &str, amount: &str, table_id: i32) -> Self {
        Self::new()
            .text("method", method)
            .text("amount", amount)
            .text("table_id", &table_id.to_string())
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// A tiny valid PNG header; enough for the screenshot content checks.
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];
