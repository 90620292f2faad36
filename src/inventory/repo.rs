use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::repo_types::{Item, ItemPatch, ItemRow, NewItem, SearchFilter, StockOutcome};
use crate::db::{like_pattern, PgStore};

/// Storage collaborator of the inventory service.
///
/// `take_stock` and `add_stock` must apply their check and write as one atomic step.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_item(&self, id: Uuid, item: &NewItem) -> anyhow::Result<Item>;
    /// Newest first.
    async fn list_items(&self, filter: &SearchFilter) -> anyhow::Result<Vec<Item>>;
    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>>;
    /// Always refreshes `updated_at` on an existing row, even for an empty patch.
    async fn update_item(&self, id: Uuid, patch: &ItemPatch) -> anyhow::Result<Option<Item>>;
    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Decrement by `quantity` only if at least that much is on hand.
    async fn take_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome>;
    /// Increment by `quantity` unless the result would not fit the column.
    async fn add_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome>;
}

const ITEM_COLUMNS: &str = "id, name, category, price, quantity, created_at, updated_at";

impl PgStore {
    async fn current_quantity(&self, id: Uuid) -> anyhow::Result<Option<i32>> {
        let quantity = sqlx::query_scalar::<_, i32>("SELECT quantity FROM sweets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("select sweet quantity")?;
        Ok(quantity)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_item(&self, id: Uuid, item: &NewItem) -> anyhow::Result<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO sweets (id, name, category, price, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.price)
        .bind(item.quantity)
        .fetch_one(&self.pool)
        .await
        .context("insert sweet")?;
        row.try_into()
    }

    async fn list_items(&self, filter: &SearchFilter) -> anyhow::Result<Vec<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ITEM_COLUMNS} FROM sweets WHERE TRUE"
        ));
        if let Some(name) = &filter.name {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(name));
        }
        if let Some(category) = &filter.category {
            qb.push(" AND category ILIKE ").push_bind(like_pattern(category));
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<ItemRow>()
            .fetch_all(&self.pool)
            .await
            .context("list sweets")?;
        rows.into_iter().map(Item::try_from).collect()
    }

    async fn get_item(&self, id: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sweets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("get sweet")?;
        row.map(Item::try_from).transpose()
    }

    async fn update_item(&self, id: Uuid, patch: &ItemPatch) -> anyhow::Result<Option<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE sweets SET updated_at = now()");
        if let Some(name) = &patch.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(category) = &patch.category {
            qb.push(", category = ").push_bind(category);
        }
        if let Some(price) = patch.price {
            qb.push(", price = ").push_bind(price);
        }
        if let Some(quantity) = patch.quantity {
            qb.push(", quantity = ").push_bind(quantity);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {ITEM_COLUMNS}"));

        let row = qb
            .build_query_as::<ItemRow>()
            .fetch_optional(&self.pool)
            .await
            .context("update sweet")?;
        row.map(Item::try_from).transpose()
    }

    async fn delete_item(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM sweets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete sweet")?;
        Ok(result.rows_affected() > 0)
    }

    async fn take_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE sweets
               SET quantity = quantity - $2, updated_at = now()
             WHERE id = $1 AND quantity >= $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .context("take stock")?;

        if let Some(row) = row {
            return Ok(StockOutcome::Updated(row.try_into()?));
        }
        Ok(match self.current_quantity(id).await? {
            Some(available) => StockOutcome::Insufficient { available },
            None => StockOutcome::Missing,
        })
    }

    async fn add_stock(&self, id: Uuid, quantity: i32) -> anyhow::Result<StockOutcome> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE sweets
               SET quantity = quantity + $2, updated_at = now()
             WHERE id = $1 AND quantity <= 2147483647 - $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await
        .context("add stock")?;

        if let Some(row) = row {
            return Ok(StockOutcome::Updated(row.try_into()?));
        }
        Ok(match self.current_quantity(id).await? {
            Some(available) => StockOutcome::Overflow { available },
            None => StockOutcome::Missing,
        })
    }
}
