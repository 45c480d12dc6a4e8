use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::{
    cart::CartService, catalog::CatalogService, checkout::CheckoutService,
    dashboard::DashboardService, orders::OrderService, payments::PaymentService,
    provisioning::ProvisioningService, tables::TableService, uploads::ScreenshotStore,
    wallet::WalletService,
};

pub mod admin;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;
pub mod tables;
pub mod users;
pub mod wallet;

pub use crate::AppState;

/// Services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub tables: Arc<TableService>,
    pub wallet: Arc<WalletService>,
    pub provisioning: Arc<ProvisioningService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let screenshots = ScreenshotStore::new(&config.upload_dir, config.max_upload_bytes);

        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool.clone())),
            checkout: Arc::new(CheckoutService::new(db_pool.clone(), screenshots)),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(db_pool.clone())),
            tables: Arc::new(TableService::new(db_pool.clone())),
            wallet: Arc::new(WalletService::new(db_pool.clone())),
            provisioning: Arc::new(ProvisioningService::new(db_pool.clone())),
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }
}
