use rust_decimal::{prelude::ToPrimitive, Decimal};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    billing::{
        dto::{CreateOrderResponse, SubscriptionStatus, VerifyPaymentRequest, WebhookEvent},
        gateway::{verify_payment_signature, verify_webhook_signature},
        repo_types::{Payment, PaymentStatus, SubscriptionPlan, UserSubscription},
    },
    db::Pagination,
    error::{AppError, AppResult},
    state::AppState,
};

/// Gateway amount in minor units; fractions of a minor unit are dropped.
pub fn minor_units(price: Decimal) -> Option<i64> {
    (price * Decimal::ONE_HUNDRED).trunc().to_i64()
}

pub async fn active_plan(state: &AppState, plan_id: Uuid) -> AppResult<SubscriptionPlan> {
    state
        .store
        .billing()
        .find_plan(plan_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or(AppError::NotFound("Plan"))
}

pub async fn create_order(
    state: &AppState,
    actor: &Actor,
    plan_id: Uuid,
) -> AppResult<CreateOrderResponse> {
    let plan = active_plan(state, plan_id).await?;
    let amount = minor_units(plan.price)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("plan price out of range")))?;
    let currency = state.config.razorpay.currency.clone();

    let order = state
        .gateway
        .create_order(amount, &currency, true)
        .await
        .map_err(AppError::Gateway)?;

    let payment = Payment {
        id: Uuid::new_v4(),
        user_id: actor.user_id,
        plan_id: plan.id,
        order_id: order.id.clone(),
        payment_id: None,
        amount: plan.price,
        currency: currency.clone(),
        status: PaymentStatus::Created,
        created_at: OffsetDateTime::now_utc(),
    };
    state.store.billing().insert_payment(&payment).await?;
    info!(order_id = %order.id, plan_id = %plan.id, amount, "order created");

    Ok(CreateOrderResponse {
        order_id: order.id,
        amount,
        currency,
        key: state.config.razorpay.key_id.clone(),
    })
}

/// Marks `payment` paid and extends its owner's subscription, once.
async fn settle(state: &AppState, payment: &Payment, payment_id: &str) -> AppResult<()> {
    let plan = state
        .store
        .billing()
        .find_plan(payment.plan_id)
        .await?
        .ok_or(AppError::NotFound("Plan"))?;
    let applied = state
        .store
        .billing()
        .complete_payment(payment, payment_id, plan.duration_days, OffsetDateTime::now_utc())
        .await?;
    if applied {
        info!(order_id = %payment.order_id, user_id = %payment.user_id, "payment settled");
    } else {
        info!(order_id = %payment.order_id, "payment already settled");
    }
    Ok(())
}

pub async fn verify_payment(
    state: &AppState,
    actor: &Actor,
    req: VerifyPaymentRequest,
) -> AppResult<SubscriptionStatus> {
    if req.razorpay_order_id.is_empty()
        || req.razorpay_payment_id.is_empty()
        || req.razorpay_signature.is_empty()
    {
        return Err(AppError::BadRequest("Missing payment details.".into()));
    }
    if !verify_payment_signature(
        &state.config.razorpay.key_secret,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    ) {
        warn!(order_id = %req.razorpay_order_id, "payment signature mismatch");
        return Err(AppError::BadRequest("Payment verification failed.".into()));
    }

    let payment = state
        .store
        .billing()
        .find_payment_by_order(&req.razorpay_order_id)
        .await?
        .filter(|p| p.user_id == actor.user_id)
        .ok_or(AppError::NotFound("Payment"))?;

    settle(state, &payment, &req.razorpay_payment_id).await?;
    subscription_status(state, actor).await
}

/// The actor's subscription; the first look starts the free trial.
pub async fn subscription_status(state: &AppState, actor: &Actor) -> AppResult<SubscriptionStatus> {
    let now = OffsetDateTime::now_utc();
    let sub = match state.store.billing().find_subscription(actor.user_id).await? {
        Some(sub) => sub,
        None => {
            let mut fresh = UserSubscription::empty(actor.user_id);
            fresh.start_trial(now, state.config.trial_days);
            let stored = state.store.billing().insert_subscription_if_absent(&fresh).await?;
            if stored == fresh {
                info!(user_id = %actor.user_id, "trial started");
            }
            stored
        }
    };
    Ok(SubscriptionStatus::of(&sub, now))
}

pub async fn start_trial(state: &AppState, actor: &Actor) -> AppResult<SubscriptionStatus> {
    let now = OffsetDateTime::now_utc();
    let mut sub = state
        .store
        .billing()
        .find_subscription(actor.user_id)
        .await?
        .unwrap_or_else(|| UserSubscription::empty(actor.user_id));
    if sub.trial_used {
        return Err(AppError::BadRequest("Trial already used.".into()));
    }
    sub.start_trial(now, state.config.trial_days);
    state.store.billing().save_subscription(&sub).await?;
    info!(user_id = %actor.user_id, "trial started");
    Ok(SubscriptionStatus::of(&sub, now))
}

pub async fn payment_history(
    state: &AppState,
    actor: &Actor,
    page: Pagination,
) -> AppResult<Vec<Payment>> {
    Ok(state
        .store
        .billing()
        .list_payments(actor.user_id, page.clamped())
        .await?)
}

/// Applies a signed gateway event. Events and orders this service does not
/// know about are acknowledged and ignored.
pub async fn handle_webhook(state: &AppState, body: &[u8], signature: Option<&str>) -> AppResult<()> {
    let valid = signature.is_some_and(|sig| {
        verify_webhook_signature(&state.config.razorpay.webhook_secret, body, sig)
    });
    if !valid {
        warn!("webhook signature rejected");
        return Err(AppError::BadRequest("Invalid signature.".into()));
    }

    let event: WebhookEvent = serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload.".into()))?;
    let Some(entity) = event.payload.payment.map(|p| p.entity) else {
        info!(event = %event.event, "webhook without payment entity ignored");
        return Ok(());
    };
    let Some(order_id) = entity.order_id.as_deref() else {
        return Ok(());
    };
    let Some(payment) = state.store.billing().find_payment_by_order(order_id).await? else {
        info!(%order_id, "webhook for unknown order ignored");
        return Ok(());
    };

    match event.event.as_str() {
        "payment.captured" => settle(state, &payment, &entity.id).await?,
        "payment.failed" => {
            if state
                .store
                .billing()
                .mark_payment_failed(order_id, Some(&entity.id))
                .await?
            {
                info!(%order_id, "payment failed");
            }
        }
        other => info!(event = %other, "webhook event ignored"),
    }
    Ok(())
}
