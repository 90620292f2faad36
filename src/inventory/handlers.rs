use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateItemRequest, QuantityRequest, SearchQuery, UpdateItemRequest},
    repo_types::{Item, SearchFilter},
};
use crate::{
    auth::extractors::{AdminUser, AuthUser},
    error::{json_body, AppError},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/sweets", get(list_items))
        .route("/sweets/search", get(search_items))
        .route("/sweets/:id", get(get_item))
        .route("/sweets/:id/purchase", post(purchase_item))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/sweets", post(create_item))
        .route("/sweets/:id", axum::routing::put(update_item).delete(delete_item))
        .route("/sweets/:id/restock", post(restock_item))
}

/// Path id of a sweet. A malformed id cannot name a sweet, so it is a 404.
#[derive(Debug)]
pub struct ItemId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ItemId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Sweet"))?;
        Ok(ItemId(id))
    }
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(state.inventory.find_all().await?))
}

#[instrument(skip(state))]
pub async fn search_items(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Item>>, AppError> {
    let filter = SearchFilter::try_from(query)?;
    Ok(Json(state.inventory.search(filter).await?))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    _user: AuthUser,
    ItemId(id): ItemId,
) -> Result<Json<Item>, AppError> {
    state
        .inventory
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Sweet"))
}

#[instrument(skip(state, payload))]
pub async fn purchase_item(
    State(state): State<AppState>,
    user: AuthUser,
    ItemId(id): ItemId,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let body = json_body(payload)?;
    let receipt = state
        .checkout
        .checkout(user.id, id, body.quantity)
        .await?
        .ok_or(AppError::NotFound("Sweet"))?;
    info!(user_id = %user.id, purchase_id = %receipt.purchase.id, "checkout complete");
    Ok(Json(receipt.item))
}

#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let body = json_body(payload)?;
    let item = state.inventory.create(body.into()).await?;
    info!(admin_id = %admin.id, sweet_id = %item.id, "admin created sweet");
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    ItemId(id): ItemId,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let body = json_body(payload)?;
    state
        .inventory
        .update(id, body.into())
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Sweet"))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ItemId(id): ItemId,
) -> Result<StatusCode, AppError> {
    if !state.inventory.delete(id).await? {
        return Err(AppError::NotFound("Sweet"));
    }
    info!(admin_id = %admin.id, sweet_id = %id, "admin deleted sweet");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn restock_item(
    State(state): State<AppState>,
    _admin: AdminUser,
    ItemId(id): ItemId,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let body = json_body(payload)?;
    state
        .inventory
        .restock(id, body.quantity)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Sweet"))
}
