/*!
 * # Role-Based Access Control
 *
 * Each role maps to the permission codes it holds and the order statuses it
 * may apply through the status-update endpoint. The mapping is declared once
 * in [`ROLE_TABLE`] and frozen into [`ROLES`] on first use; nothing mutates
 * it afterwards.
 */

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

use super::permissions::consts::*;
use crate::entities::order::OrderStatus;
use crate::entities::user::Role;

/// Declarative row of the role table.
pub struct RoleSpec {
    pub role: Role,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
    pub settable_statuses: &'static [OrderStatus],
}

const CLIENT: &[&str] = &[USE_CLIENT_PANEL, VIEW_PRODUCTS, VIEW_TABLES];

const ALL_STATUSES: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Preparing,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
    OrderStatus::Refunded,
];

pub const ROLE_TABLE: &[RoleSpec] = &[
    RoleSpec {
        role: Role::Admin,
        description: "Administrator with full access",
        permissions: &[
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
        ],
        settable_statuses: ALL_STATUSES,
    },
    RoleSpec {
        role: Role::Manager,
        description: "Runs the floor; may move orders to any status",
        permissions: &[
            USE_CLIENT_PANEL,
            VIEW_DASHBOARD,
            VIEW_PRODUCTS,
            VIEW_ORDERS,
            MANAGE_ORDERS,
            VIEW_TABLES,
            VIEW_PAYMENTS,
            MANAGE_WALLETS,
        ],
        settable_statuses: ALL_STATUSES,
    },
    RoleSpec {
        role: Role::Chef,
        description: "Kitchen staff",
        permissions: &[
            USE_CLIENT_PANEL,
            VIEW_PRODUCTS,
            VIEW_TABLES,
            VIEW_ORDERS,
            MANAGE_ORDERS,
        ],
        settable_statuses: &[OrderStatus::Preparing, OrderStatus::Cancelled],
    },
    RoleSpec {
        role: Role::Cashier,
        description: "Till staff",
        permissions: &[
            USE_CLIENT_PANEL,
            VIEW_PRODUCTS,
            VIEW_TABLES,
            VIEW_ORDERS,
            MANAGE_ORDERS,
            VIEW_PAYMENTS,
        ],
        settable_statuses: &[OrderStatus::Cancelled, OrderStatus::Refunded],
    },
    RoleSpec {
        role: Role::Waiter,
        description: "Front-of-house staff",
        permissions: &[
            USE_CLIENT_PANEL,
            VIEW_PRODUCTS,
            VIEW_TABLES,
            VIEW_ORDERS,
            MANAGE_ORDERS,
        ],
        settable_statuses: &[OrderStatus::Confirmed, OrderStatus::Delivered],
    },
    RoleSpec {
        role: Role::Customer,
        description: "Canteen customer",
        permissions: CLIENT,
        settable_statuses: &[],
    },
];

/// Frozen view of one [`RoleSpec`].
#[derive(Debug, Clone)]
pub struct RolePolicy {
    pub role: Role,
    pub description: &'static str,
    pub permissions: HashSet<&'static str>,
    pub settable_statuses: HashSet<OrderStatus>,
}

lazy_static! {
    pub static ref ROLES: HashMap<Role, RolePolicy> = ROLE_TABLE
        .iter()
        .map(|entry| {
            (
                entry.role,
                RolePolicy {
                    role: entry.role,
                    description: entry.description,
                    permissions: entry.permissions.iter().copied().collect(),
                    settable_statuses: entry.settable_statuses.iter().copied().collect(),
                },
            )
        })
        .collect();
}

pub fn policy_for(role: Role) -> Option<&'static RolePolicy> {
    ROLES.get(&role)
}

pub fn role_has_permission(role: Role, permission: &str) -> bool {
    policy_for(role)
        .map(|policy| policy.permissions.contains(permission))
        .unwrap_or(false)
}

/// Permission codes held by `role`, sorted for stable output.
pub fn permissions_for(role: Role) -> Vec<String> {
    let mut codes: Vec<String> = policy_for(role)
        .map(|policy| policy.permissions.iter().map(|p| p.to_string()).collect())
        .unwrap_or_default();
    codes.sort();
    codes
}

/// Whether `role` may move an order into `status`.
pub fn can_set_status(role: Role, status: OrderStatus) -> bool {
    policy_for(role)
        .map(|policy| policy.settable_statuses.contains(&status))
        .unwrap_or(false)
}
