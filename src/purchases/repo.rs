use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{NewPurchase, Purchase, PurchaseRow, PurchaseWithItem};
use crate::db::PgStore;

/// Append-only purchase ledger.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    async fn insert_purchase(&self, id: Uuid, purchase: &NewPurchase) -> anyhow::Result<Purchase>;
    /// Newest first, joined with the current name and category of each sweet.
    async fn purchases_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<PurchaseWithItem>>;
}

#[async_trait]
impl PurchaseLedger for PgStore {
    async fn insert_purchase(&self, id: Uuid, purchase: &NewPurchase) -> anyhow::Result<Purchase> {
        let row = sqlx::query_as::<_, PurchaseRow>(
            r#"
            INSERT INTO purchases (id, user_id, sweet_id, quantity, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, sweet_id, quantity, total_price, created_at,
                      NULL::text AS sweet_name, NULL::text AS sweet_category
            "#,
        )
        .bind(id)
        .bind(purchase.user_id)
        .bind(purchase.item_id)
        .bind(purchase.quantity)
        .bind(purchase.total_price)
        .fetch_one(&self.pool)
        .await
        .context("insert purchase")?;
        Ok(PurchaseWithItem::try_from(row)?.purchase)
    }

    async fn purchases_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<PurchaseWithItem>> {
        let rows = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT p.id, p.user_id, p.sweet_id, p.quantity, p.total_price, p.created_at,
                   s.name AS sweet_name, s.category AS sweet_category
              FROM purchases p
              LEFT JOIN sweets s ON s.id = p.sweet_id
             WHERE p.user_id = $1
             ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("list purchases by user")?;
        rows.into_iter().map(PurchaseWithItem::try_from).collect()
    }
}
