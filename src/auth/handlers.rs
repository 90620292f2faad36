use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest, PublicUser, RefreshRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::{Role, User},
        services,
    },
    error::{json_body, AppError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AppError> {
    let token = keys.sign_access(user.id, user.role)?;
    let refresh_token = keys.sign_refresh(user.id, user.role)?;
    Ok(AuthResponse {
        token,
        refresh_token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let body = json_body(payload)?;
    let user = services::register(state.users.as_ref(), &body.email, &body.password, Role::User).await?;
    Ok((StatusCode::CREATED, Json(issue_tokens(&state.jwt, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let body = json_body(payload)?;
    let user = services::authenticate(state.users.as_ref(), &body.email, &body.password).await?;
    Ok(Json(issue_tokens(&state.jwt, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let body = json_body(payload)?;
    let claims = state.jwt.verify_refresh(&body.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    // role may have changed since the refresh token was issued
    let user = state
        .users
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&state.jwt, user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = state
        .users
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(user.into()))
}
