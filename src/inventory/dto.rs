use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::repo_types::{ItemPatch, NewItem, SearchFilter};
use crate::error::AppError;

/// Body of `POST /api/sweets`.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub category: String,
    #[serde(deserialize_with = "rust_decimal::serde::float::deserialize")]
    pub price: Decimal,
    pub quantity: i32,
}

impl From<CreateItemRequest> for NewItem {
    fn from(r: CreateItemRequest) -> Self {
        Self {
            name: r.name,
            category: r.category,
            price: r.price,
            quantity: r.quantity,
        }
    }
}

/// Body of `PUT /api/sweets/:id`; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "rust_decimal::serde::float_option::deserialize")]
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
}

impl From<UpdateItemRequest> for ItemPatch {
    fn from(r: UpdateItemRequest) -> Self {
        Self {
            name: r.name,
            category: r.category,
            price: r.price,
            quantity: r.quantity,
        }
    }
}

/// Body of the purchase and restock endpoints.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

/// Query of `GET /api/sweets/search`. Empty values count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub name: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl TryFrom<SearchQuery> for SearchFilter {
    type Error = AppError;

    fn try_from(q: SearchQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            name: non_empty(q.name),
            category: non_empty(q.category),
            min_price: bound("minPrice", q.min_price)?,
            max_price: bound("maxPrice", q.max_price)?,
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn bound(param: &str, v: Option<String>) -> Result<Option<Decimal>, AppError> {
    non_empty(v)
        .map(|s| {
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .map_err(|_| AppError::Validation(format!("{param} must be a number")))
        })
        .transpose()
}
