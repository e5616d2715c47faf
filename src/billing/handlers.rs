use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    billing::{
        dto::{CreateOrderRequest, CreateOrderResponse, SubscriptionStatus, VerifyPaymentRequest, WebhookAck},
        repo_types::{Payment, SubscriptionPlan},
        services,
    },
    db::Pagination,
    error::{AppJson, AppQuery, AppResult},
    state::AppState,
};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/subscription-plans", get(list_plans))
        .route("/subscription-plans/:id", get(get_plan))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/create-order", post(create_order))
        .route("/payments/verify-payment", post(verify_payment))
        .route("/payments/subscription-status", get(subscription_status))
        .route("/payments/start-trial", post(start_trial))
        .route("/payments/history", get(history))
        .route("/payments/webhook", post(webhook))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn list_plans(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(state.store.billing().list_active_plans().await?))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn get_plan(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SubscriptionPlan>> {
    Ok(Json(services::active_plan(&state, id).await?))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<Json<CreateOrderResponse>> {
    Ok(Json(services::create_order(&state, &actor, payload.plan_id).await?))
}

#[instrument(skip(state, actor, payload), fields(user_id = %actor.user_id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    actor: Actor,
    AppJson(payload): AppJson<VerifyPaymentRequest>,
) -> AppResult<Json<SubscriptionStatus>> {
    Ok(Json(services::verify_payment(&state, &actor, payload).await?))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn subscription_status(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<SubscriptionStatus>> {
    Ok(Json(services::subscription_status(&state, &actor).await?))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn start_trial(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<SubscriptionStatus>> {
    Ok(Json(services::start_trial(&state, &actor).await?))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn history(
    State(state): State<AppState>,
    actor: Actor,
    AppQuery(page): AppQuery<Pagination>,
) -> AppResult<Json<Vec<Payment>>> {
    Ok(Json(services::payment_history(&state, &actor, page).await?))
}

/// Gateway callback; authenticated by signature, not by token.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    services::handle_webhook(&state, &body, signature).await?;
    Ok(Json(WebhookAck { status: "ok" }))
}
