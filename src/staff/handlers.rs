use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{extractors::Actor, repo_types::User},
    db::Pagination,
    error::{AppJson, AppQuery, AppResult},
    staff::{dto::StaffDraft, services},
    state::AppState,
};

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/staff", get(list_staff).post(create_staff))
        .route(
            "/staff/:id",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn list_staff(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(services::list_staff(state.store.as_ref(), &actor, page).await?))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn create_staff(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<StaffDraft>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = services::create_staff(state.store.as_ref(), &actor, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get_staff(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(services::get_staff(state.store.as_ref(), &actor, id).await?))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn update_staff(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<StaffDraft>,
) -> AppResult<Json<User>> {
    Ok(Json(
        services::update_staff(state.store.as_ref(), &actor, id, payload).await?,
    ))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn delete_staff(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete_staff(state.store.as_ref(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
