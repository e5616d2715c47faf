use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    db::{DbResult, Pagination, PgStore},
    error::{AppError, AppJson, AppQuery, AppResult, FieldErrors},
    state::AppState,
};

/// Product feedback left by a user; visible to its author only.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub rating: Option<i16>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackDraft {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rating: Option<i16>,
}

impl FeedbackDraft {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.message.trim().is_empty() {
            errors.add("message", "This field is required.");
        }
        if self.rating.is_some_and(|r| !(1..=5).contains(&r)) {
            errors.add("rating", "Ensure this value is between 1 and 5.");
        }
        errors.into_result()
    }
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    async fn list_for_user(&self, user_id: Uuid, page: Pagination) -> DbResult<Vec<Feedback>>;
    async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<Option<Feedback>>;
    async fn insert(&self, feedback: &Feedback) -> DbResult<Feedback>;
    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<bool>;
}

const COLUMNS: &str = "id, user_id, message, rating, created_at";

#[async_trait]
impl FeedbackRepo for PgStore {
    async fn list_for_user(&self, user_id: Uuid, page: Pagination) -> DbResult<Vec<Feedback>> {
        let rows = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            SELECT {COLUMNS} FROM feedback
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<Option<Feedback>> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            "SELECT {COLUMNS} FROM feedback WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, f: &Feedback) -> DbResult<Feedback> {
        let row = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            INSERT INTO feedback (id, user_id, message, rating, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(f.id)
        .bind(f.user_id)
        .bind(&f.message)
        .bind(f.rating)
        .bind(f.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_for_user(&self, user_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM feedback WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feedback", get(list_feedback).post(create_feedback))
        .route("/feedback/:id", get(get_feedback).delete(delete_feedback))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn list_feedback(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<Feedback>>> {
    let rows = state
        .store
        .feedback()
        .list_for_user(actor.user_id, page.clamped())
        .await?;
    Ok(Json(rows))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn create_feedback(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<FeedbackDraft>,
) -> AppResult<(StatusCode, Json<Feedback>)> {
    payload.validate()?;
    let feedback = Feedback {
        id: Uuid::new_v4(),
        user_id: actor.user_id,
        message: payload.message.trim().to_string(),
        rating: payload.rating,
        created_at: OffsetDateTime::now_utc(),
    };
    let created = state.store.feedback().insert(&feedback).await?;
    info!(feedback_id = %created.id, "feedback received");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Feedback>> {
    state
        .store
        .feedback()
        .get_for_user(actor.user_id, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Feedback"))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn delete_feedback(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !state.store.feedback().delete_for_user(actor.user_id, id).await? {
        return Err(AppError::NotFound("Feedback"));
    }
    Ok(StatusCode::NO_CONTENT)
}
