use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::entities::{category, product};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_active: bool,
    pub category_id: Option<i32>,
    pub category: Option<String>,
}

impl ProductView {
    fn from_parts(product: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            is_active: product.is_active,
            category_id: product.category_id,
            category: category.map(|c| c.name),
        }
    }
}

/// Read side of the menu.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Products on the menu. Inactive products are only listed for staff.
    pub async fn list_products(
        &self,
        category_id: Option<i32>,
        include_inactive: bool,
    ) -> Result<Vec<ProductView>, ServiceError> {
        let mut query = product::Entity::find().find_also_related(category::Entity);
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if !include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }

        let rows = query
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(p, c)| ProductView::from_parts(p, c))
            .collect())
    }

    pub async fn get_product(&self, product_id: i32) -> Result<ProductView, ServiceError> {
        let (product, category) = product::Entity::find_by_id(product_id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;
        Ok(ProductView::from_parts(product, category))
    }
}
