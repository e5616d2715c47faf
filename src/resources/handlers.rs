use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    db::Pagination,
    error::{AppJson, AppQuery, AppResult},
    resources::{scope, Resource},
    state::AppState,
};

/// List/create on `path`, retrieve/update/delete on `path/:id`, all pinned
/// to the actor's shop.
pub fn resource_routes<R: Resource>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(list::<R>).post(create::<R>))
        .route(
            &format!("{path}/:id"),
            get(retrieve::<R>).put(update::<R>).delete(destroy::<R>),
        )
}

#[instrument(skip(state, actor), fields(resource = R::NAME, user_id = %actor.user_id, role = actor.role.as_str()))]
async fn list<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<R>>> {
    Ok(Json(scope::list::<R>(state.store.as_ref(), &actor, page).await?))
}

#[instrument(skip(state, actor, payload), fields(resource = R::NAME, user_id = %actor.user_id, role = actor.role.as_str()))]
async fn create<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<R::Draft>,
) -> AppResult<(StatusCode, Json<R>)> {
    let created = scope::create::<R>(state.store.as_ref(), &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, actor), fields(resource = R::NAME, user_id = %actor.user_id, role = actor.role.as_str()))]
async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<R>> {
    Ok(Json(scope::get::<R>(state.store.as_ref(), &actor, id).await?))
}

#[instrument(skip(state, actor, payload), fields(resource = R::NAME, user_id = %actor.user_id, role = actor.role.as_str()))]
async fn update<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<R::Draft>,
) -> AppResult<Json<R>> {
    Ok(Json(scope::update::<R>(state.store.as_ref(), &actor, id, payload).await?))
}

#[instrument(skip(state, actor), fields(resource = R::NAME, user_id = %actor.user_id, role = actor.role.as_str()))]
async fn destroy<R: Resource>(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    scope::delete::<R>(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
