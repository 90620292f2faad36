use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Raw `sweets` row as returned by Postgres.
#[derive(Debug, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub quantity: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A catalog entry. `quantity >= 0` and `price > 0` hold for every value of this type
/// that came out of a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    pub quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ItemRow> for Item {
    type Error = anyhow::Error;

    fn try_from(r: ItemRow) -> Result<Self, Self::Error> {
        anyhow::ensure!(r.quantity >= 0, "sweet {} has negative quantity {}", r.id, r.quantity);
        anyhow::ensure!(r.price > Decimal::ZERO, "sweet {} has non-positive price {}", r.id, r.price);
        Ok(Self {
            id: r.id,
            name: r.name,
            category: r.category,
            price: r.price,
            quantity: r.quantity,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated input for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub price: Decimal,
    pub quantity: i32,
}

/// Fields to overwrite on update; `None` leaves the column alone.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
}

/// Conjunctive catalog filter. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub name: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    pub fn matches(&self, item: &Item) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            needle
                .as_ref()
                .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        }
        contains(&item.name, &self.name)
            && contains(&item.category, &self.category)
            && self.min_price.map_or(true, |min| item.price >= min)
            && self.max_price.map_or(true, |max| item.price <= max)
    }
}

/// Result of a conditional stock mutation at the storage layer.
#[derive(Debug)]
pub enum StockOutcome {
    Updated(Item),
    Insufficient { available: i32 },
    Overflow { available: i32 },
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn item(name: &str, category: &str, price: Decimal) -> Item {
        let now = OffsetDateTime::now_utc();
        Item {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            price,
            quantity: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filter_is_case_insensitive_and_conjunctive() {
        let choco = item("Choco Bar", "Chocolate", dec(5));
        let filter = SearchFilter {
            name: Some("CHOCO".into()),
            max_price: Some(dec(5)),
            ..Default::default()
        };
        assert!(filter.matches(&choco));

        let filter = SearchFilter {
            name: Some("choco".into()),
            category: Some("candy".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&choco));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let mint = item("Mint", "Candy", dec(2));
        let filter = SearchFilter {
            min_price: Some(dec(2)),
            max_price: Some(dec(2)),
            ..Default::default()
        };
        assert!(filter.matches(&mint));
        assert!(SearchFilter::default().is_empty());
    }

    #[test]
    fn row_with_negative_quantity_is_rejected() {
        let now = OffsetDateTime::now_utc();
        let row = ItemRow {
            id: Uuid::new_v4(),
            name: "Fudge".into(),
            category: "Toffee".into(),
            price: dec(3),
            quantity: -1,
            created_at: now,
            updated_at: now,
        };
        assert!(Item::try_from(row).is_err());
    }
}
