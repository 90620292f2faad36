use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ledger entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` once the sweet has been deleted.
    #[serde(rename = "sweet_id")]
    pub item_id: Option<Uuid>,
    pub quantity: i32,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub total_price: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i32,
    /// Unit price at the time of sale times quantity.
    pub total_price: Decimal,
}

/// Name and category of the purchased sweet, read at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseWithItem {
    #[serde(flatten)]
    pub purchase: Purchase,
    #[serde(rename = "sweet")]
    pub item: Option<ItemSnapshot>,
}

/// `purchases LEFT JOIN sweets` row.
#[derive(Debug, FromRow)]
pub struct PurchaseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sweet_id: Option<Uuid>,
    pub quantity: i32,
    pub total_price: Decimal,
    pub created_at: OffsetDateTime,
    pub sweet_name: Option<String>,
    pub sweet_category: Option<String>,
}

impl TryFrom<PurchaseRow> for PurchaseWithItem {
    type Error = anyhow::Error;

    fn try_from(r: PurchaseRow) -> Result<Self, Self::Error> {
        anyhow::ensure!(r.quantity > 0, "purchase {} has quantity {}", r.id, r.quantity);
        let item = match (r.sweet_name, r.sweet_category) {
            (Some(name), Some(category)) => Some(ItemSnapshot { name, category }),
            _ => None,
        };
        Ok(Self {
            purchase: Purchase {
                id: r.id,
                user_id: r.user_id,
                item_id: r.sweet_id,
                quantity: r.quantity,
                total_price: r.total_price,
                created_at: r.created_at,
            },
            item,
        })
    }
}
