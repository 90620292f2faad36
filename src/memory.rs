use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{Role, User},
    },
    inventory::{
        repo::CatalogStore,
        repo_types::{Item, ItemPatch, NewItem, SearchFilter, StockOutcome},
    },
    purchases::{
        repo::PurchaseLedger,
        repo_types::{ItemSnapshot, NewPurchase, Purchase, PurchaseWithItem},
    },
};

#[derive(Default)]
struct Tables {
    // insertion order; listing walks it backwards
    items: Vec<Item>,
    purchases: Vec<Purchase>,
    users: Vec<User>,
}

/// In-process store used for tests and for `STORE_BACKEND=memory`.
///
/// Every mutation runs under the write lock, so check-and-write sequences are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_item(&self, id: Uuid, item: &NewItem) -> anyhow::Result<Item> {
        let now = OffsetDateTime::now_utc();
        let item = Item {
            id,
            name: item.name.clone(),
            category: item.category.clone(),
            price: item.price,
            quantity: item.quantity,
            created_at: now,
            updated_at: now,
        };
        let mut t = self.tables.write().await;
        anyhow::ensure!(t.items.iter().all(|i| i.id != id), "duplicate sweet id {id}");
        t.items.push(item.clone());
        Ok(item)
    }

    async fn list_items(&self, filter: &SearchFilter) -> anyhow::Result<Vec<Item>> {
        let t = self.tables.read().await;
        let mut items: Vec<Item> = t
            .items
            .iter()
            .rev()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let t = self.tables.read().await;
        Ok(t.items.iter().find(|i| i.id == id).cloned())
    }

    async fn update_item(&self, id: Uuid, patch: &ItemPatch) -> anyhow::Result<Option<Item>> {
        let mut t = self.tables.write().await;
        let Some(item) = t.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            item.name = name.clone();
        }
        if let Some(category) = &patch.category {
            item.category = category.clone();
        }
        if let Some(price) = patch.price {
            item.price = price;
        }
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        item.updated_at = OffsetDateTime::now_utc();
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.items.len();
        t.items.retain(|i| i.id != id);
        if t.items.len() == before {
            return Ok(false);
        }
        for p in t.purchases.iter_mut().filter(|p| p.item_id == Some(id)) {
            p.item_id = None;
        }
        Ok(true)
    }

    async fn take_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome> {
        let mut t = self.tables.write().await;
        let Some(item) = t.items.iter_mut().find(|i| i.id == id) else {
            return Ok(StockOutcome::Missing);
        };
        if item.quantity < quantity {
            return Ok(StockOutcome::Insufficient { available: item.quantity });
        }
        item.quantity -= quantity;
        item.updated_at = OffsetDateTime::now_utc();
        Ok(StockOutcome::Updated(item.clone()))
    }

    async fn add_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome> {
        let mut t = self.tables.write().await;
        let Some(item) = t.items.iter_mut().find(|i| i.id == id) else {
            return Ok(StockOutcome::Missing);
        };
        let Some(next) = item.quantity.checked_add(quantity) else {
            return Ok(StockOutcome::Overflow { available: item.quantity });
        };
        item.quantity = next;
        item.updated_at = OffsetDateTime::now_utc();
        Ok(StockOutcome::Updated(item.clone()))
    }
}

#[async_trait]
impl PurchaseLedger for MemoryStore {
    async fn insert_purchase(&self, id: Uuid, purchase: &NewPurchase) -> anyhow::Result<Purchase> {
        let purchase = Purchase {
            id,
            user_id: purchase.user_id,
            item_id: Some(purchase.item_id),
            quantity: purchase.quantity,
            total_price: purchase.total_price,
            created_at: OffsetDateTime::now_utc(),
        };
        let mut t = self.tables.write().await;
        t.purchases.push(purchase.clone());
        Ok(purchase)
    }

    async fn purchases_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<PurchaseWithItem>> {
        let t = self.tables.read().await;
        let mut history: Vec<PurchaseWithItem> = t
            .purchases
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .map(|p| {
                let item = p
                    .item_id
                    .and_then(|id| t.items.iter().find(|i| i.id == id))
                    .map(|i| ItemSnapshot {
                        name: i.name.clone(),
                        category: i.category.clone(),
                    });
                PurchaseWithItem {
                    purchase: p.clone(),
                    item,
                }
            })
            .collect();
        history.sort_by(|a, b| b.purchase.created_at.cmp(&a.purchase.created_at));
        Ok(history)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(Some(user))
    }
}
