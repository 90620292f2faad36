use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::repo_types::PurchaseWithItem;
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/purchases/history", get(history))
}

/// Purchase history of the caller. There is no way to ask for another user's.
#[instrument(skip(state))]
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<PurchaseWithItem>>, AppError> {
    Ok(Json(state.purchases.history_for(user.id).await?))
}
