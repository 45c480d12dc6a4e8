//! Predefined permission codes.
//!
//! Codes are plain strings so they can be granted through [`super::rbac`]
//! without a schema change; [`PERMISSIONS`] is the full catalog.

pub mod consts {
    pub const USE_CLIENT_PANEL: &str = "use_client_panel";
    pub const VIEW_DASHBOARD: &str = "view_dashboard";
    pub const VIEW_PRODUCTS: &str = "view_products";
    pub const VIEW_ORDERS: &str = "view_orders";
    pub const MANAGE_ORDERS: &str = "manage_orders";
    pub const VIEW_TABLES: &str = "view_tables";
    pub const VIEW_PAYMENTS: &str = "view_payments";
    pub const MANAGE_PAYMENTS: &str = "manage_payments";
    pub const MANAGE_WALLETS: &str = "manage_wallets";
    pub const MANAGE_USERS: &str = "manage_users";
}

use consts::*;

/// Every permission code a role may be granted.
pub const PERMISSIONS: &[&str] = &[
    USE_CLIENT_PANEL,
    VIEW_DASHBOARD,
    VIEW_PRODUCTS,
    VIEW_ORDERS,
    MANAGE_ORDERS,
    VIEW_TABLES,
    VIEW_PAYMENTS,
    MANAGE_PAYMENTS,
    MANAGE_WALLETS,
    MANAGE_USERS,
];

pub fn is_known_permission(code: &str) -> bool {
    PERMISSIONS.contains(&code)
}
