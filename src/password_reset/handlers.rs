use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::{AppJson, AppResult},
    password_reset::{
        dto::{ForgotPasswordRequest, MessageResponse, ResetPasswordRequest},
        services::{self, RESET_DONE, RESET_REQUESTED},
    },
    state::AppState,
};

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password/:uidb64/:token", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::request_reset(&state, payload.email.as_deref()).await?;
    Ok(Json(MessageResponse {
        message: RESET_REQUESTED,
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::confirm_reset(&state, &uidb64, &token, payload).await?;
    Ok(Json(MessageResponse {
        message: RESET_DONE,
    }))
}
