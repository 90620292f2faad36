use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    repo::CatalogStore,
    repo_types::{Item, ItemPatch, NewItem, SearchFilter, StockOutcome},
};
use crate::error::ServiceError;

/// Catalog CRUD, search and the two stock mutations.
///
/// Has no notion of roles; callers gate the admin operations.
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn CatalogStore>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, item: NewItem) -> Result<Item, ServiceError> {
        let item = NewItem {
            name: label("Name", &item.name)?,
            category: label("Category", &item.category)?,
            price: price(item.price)?,
            quantity: stock_level(item.quantity)?,
        };
        let created = self.store.insert_item(Uuid::new_v4(), &item).await?;
        info!(sweet_id = %created.id, name = %created.name, "sweet created");
        Ok(created)
    }

    pub async fn find_all(&self) -> Result<Vec<Item>, ServiceError> {
        Ok(self.store.list_items(&SearchFilter::default()).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Item>, ServiceError> {
        Ok(self.store.get_item(id).await?)
    }

    pub async fn search(&self, filter: SearchFilter) -> Result<Vec<Item>, ServiceError> {
        if filter.is_empty() {
            return self.find_all().await;
        }
        debug!(?filter, "search sweets");
        Ok(self.store.list_items(&filter).await?)
    }

    pub async fn update(&self, id: Uuid, patch: ItemPatch) -> Result<Option<Item>, ServiceError> {
        let patch = ItemPatch {
            name: patch.name.as_deref().map(|v| label("Name", v)).transpose()?,
            category: patch.category.as_deref().map(|v| label("Category", v)).transpose()?,
            price: patch.price.map(price).transpose()?,
            quantity: patch.quantity.map(stock_level).transpose()?,
        };
        let updated = self.store.update_item(id, &patch).await?;
        if updated.is_some() {
            info!(sweet_id = %id, "sweet updated");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let deleted = self.store.delete_item(id).await?;
        if deleted {
            info!(sweet_id = %id, "sweet deleted");
        }
        Ok(deleted)
    }

    pub async fn purchase(&self, id: Uuid, quantity: i32) -> Result<Option<Item>, ServiceError> {
        let quantity = units(quantity)?;
        match self.store.take_stock(id, quantity).await? {
            StockOutcome::Updated(item) => {
                info!(sweet_id = %id, quantity, remaining = item.quantity, "stock taken");
                Ok(Some(item))
            }
            StockOutcome::Insufficient { available } => {
                warn!(sweet_id = %id, requested = quantity, available, "insufficient stock");
                Err(ServiceError::InsufficientStock {
                    requested: quantity,
                    available,
                })
            }
            StockOutcome::Overflow { .. } => Err(ServiceError::Storage(anyhow::anyhow!(
                "store reported overflow while taking stock of {id}"
            ))),
            StockOutcome::Missing => Ok(None),
        }
    }

    pub async fn restock(&self, id: Uuid, quantity: i32) -> Result<Option<Item>, ServiceError> {
        let quantity = units(quantity)?;
        match self.store.add_stock(id, quantity).await? {
            StockOutcome::Updated(item) => {
                info!(sweet_id = %id, quantity, on_hand = item.quantity, "stock added");
                Ok(Some(item))
            }
            StockOutcome::Overflow { available } => Err(ServiceError::Validation(format!(
                "Restocking {quantity} would exceed the maximum quantity (currently {available})"
            ))),
            StockOutcome::Insufficient { .. } => Err(ServiceError::Storage(anyhow::anyhow!(
                "store reported insufficient stock while restocking {id}"
            ))),
            StockOutcome::Missing => Ok(None),
        }
    }
}

fn label(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn price(value: Decimal) -> Result<Decimal, ServiceError> {
    // stored as NUMERIC(10, 2)
    let value = value.round_dp(2);
    if value <= Decimal::ZERO {
        return Err(ServiceError::Validation("Price must be positive".into()));
    }
    if value >= Decimal::new(100_000_000, 0) {
        return Err(ServiceError::Validation("Price is too large".into()));
    }
    Ok(value)
}

fn stock_level(value: i32) -> Result<i32, ServiceError> {
    if value < 0 {
        return Err(ServiceError::Validation("Quantity must be non-negative".into()));
    }
    Ok(value)
}

fn units(value: i32) -> Result<i32, ServiceError> {
    if value <= 0 {
        return Err(ServiceError::Validation("Valid quantity is required".into()));
    }
    Ok(value)
}
