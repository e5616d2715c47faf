use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    error::{AppError, AppJson, AppResult},
    shops::{
        dto::{RegisterShopRequest, RegisterShopResponse},
        registration::register_shop,
        repo_types::{Shop, ShopDraft},
    },
    state::AppState,
};

pub fn registration_routes() -> Router<AppState> {
    Router::new().route("/register-shop", post(register))
}

pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/shops", get(list_shops))
        .route("/shops/:id", get(get_shop).put(update_shop))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterShopRequest>,
) -> AppResult<(StatusCode, Json<RegisterShopResponse>)> {
    let out = register_shop(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

/// The actor's own shop, if `id` names it.
async fn own_shop(state: &AppState, actor: &Actor, id: Uuid) -> AppResult<Shop> {
    if actor.shop_id != Some(id) {
        return Err(AppError::NotFound("Shop"));
    }
    state
        .store
        .shops()
        .get(id)
        .await?
        .ok_or(AppError::NotFound("Shop"))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn list_shops(State(state): State<AppState>, actor: Actor) -> AppResult<Json<Vec<Shop>>> {
    let shops = match actor.shop_id {
        Some(id) => state.store.shops().get(id).await?.into_iter().collect(),
        None => Vec::new(),
    };
    Ok(Json(shops))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get_shop(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Shop>> {
    Ok(Json(own_shop(&state, &actor, id).await?))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn update_shop(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ShopDraft>,
) -> AppResult<Json<Shop>> {
    let mut shop = own_shop(&state, &actor, id).await?;
    payload.validate()?;
    shop.apply(payload);
    let updated = state
        .store
        .shops()
        .update(&shop)
        .await?
        .ok_or(AppError::NotFound("Shop"))?;
    info!(shop_id = %updated.id, "shop updated");
    Ok(Json(updated))
}
