//! Business logic for the canteen. Every service holds a shared connection
//! pool; multi-row writes run inside one database transaction and helpers that
//! participate in a caller's transaction take `&impl ConnectionTrait`.

use serde::Serialize;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod order_status;
pub mod orders;
pub mod payments;
pub mod provisioning;
pub mod tables;
pub mod uploads;
pub mod wallet;

/// One-based page request, already clamped by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Zero-based page index as expected by sea-orm paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// A page of results plus the totals needed to render pagers.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: total.div_ceil(request.per_page),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}
