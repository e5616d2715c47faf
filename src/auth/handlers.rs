use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, RefreshRequest},
        extractors::Actor,
        jwt::JwtKeys,
        password::verify_password_blocking,
        repo_types::User,
    },
    error::{AppError, AppJson, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

fn issue_pair(keys: &JwtKeys, user: User) -> AppResult<AuthResponse> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user,
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let username = payload.username.trim();
    let Some(user) = state.store.users().find_by_username(username).await? else {
        warn!("login for unknown username");
        return Err(invalid_credentials());
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok || !user.is_active {
        warn!(user_id = %user.id, "login rejected");
        return Err(invalid_credentials());
    }

    let keys = JwtKeys::from_ref(&state);
    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_pair(&keys, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

    let user = state
        .store
        .users()
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(issue_pair(&keys, user)?))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get_me(State(state): State<AppState>, actor: Actor) -> AppResult<Json<MeResponse>> {
    let user = state
        .store
        .users()
        .find_by_id(actor.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let shop = match user.shop_id {
        Some(id) => state.store.shops().get(id).await?,
        None => None,
    };
    Ok(Json(MeResponse { user, shop }))
}
