use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    billing::repo_types::{Payment, PaymentStatus, SubscriptionPlan, UserSubscription},
    db::{DbError, DbResult, Pagination, PgStore},
};

const PLAN_COLUMNS: &str = "id, name, price, duration_days, description, is_active";
const PAYMENT_COLUMNS: &str =
    "id, user_id, plan_id, order_id, payment_id, amount, currency, status, created_at";
const SUBSCRIPTION_COLUMNS: &str =
    "user_id, plan_id, start_date, expiry_date, is_trial, trial_used, admin_override";

#[async_trait]
pub trait BillingRepo: Send + Sync {
    async fn list_active_plans(&self) -> DbResult<Vec<SubscriptionPlan>>;
    /// Any plan, active or not; payments may outlive a plan's retirement.
    async fn find_plan(&self, id: Uuid) -> DbResult<Option<SubscriptionPlan>>;

    async fn insert_payment(&self, payment: &Payment) -> DbResult<Payment>;
    async fn find_payment_by_order(&self, order_id: &str) -> DbResult<Option<Payment>>;
    /// Newest first.
    async fn list_payments(&self, user_id: Uuid, page: Pagination) -> DbResult<Vec<Payment>>;
    /// Marks a not-yet-paid payment failed. False when nothing changed.
    async fn mark_payment_failed(&self, order_id: &str, payment_id: Option<&str>) -> DbResult<bool>;
    /// Marks the payment paid and extends the owner's subscription by
    /// `duration_days`, as one unit. False (and no extension) when the
    /// payment was already paid.
    async fn complete_payment(
        &self,
        payment: &Payment,
        payment_id: &str,
        duration_days: i32,
        now: OffsetDateTime,
    ) -> DbResult<bool>;

    async fn find_subscription(&self, user_id: Uuid) -> DbResult<Option<UserSubscription>>;
    /// Stores `sub` unless the user already has one; returns the stored row.
    async fn insert_subscription_if_absent(&self, sub: &UserSubscription) -> DbResult<UserSubscription>;
    async fn save_subscription(&self, sub: &UserSubscription) -> DbResult<()>;
}

#[async_trait]
impl BillingRepo for PgStore {
    async fn list_active_plans(&self) -> DbResult<Vec<SubscriptionPlan>> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_active ORDER BY price ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(plans)
    }

    async fn find_plan(&self, id: Uuid) -> DbResult<Option<SubscriptionPlan>> {
        let plan = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(plan)
    }

    async fn insert_payment(&self, p: &Payment) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (id, user_id, plan_id, order_id, payment_id, amount, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(p.id)
        .bind(p.user_id)
        .bind(p.plan_id)
        .bind(&p.order_id)
        .bind(&p.payment_id)
        .bind(p.amount)
        .bind(&p.currency)
        .bind(p.status.as_str())
        .bind(p.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::tagged("payment", e))
    }

    async fn find_payment_by_order(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn list_payments(&self, user_id: Uuid, page: Pagination) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
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

    async fn mark_payment_failed(&self, order_id: &str, payment_id: Option<&str>) -> DbResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, payment_id = COALESCE($3, payment_id)
            WHERE order_id = $1 AND status = $4
            "#,
        )
        .bind(order_id)
        .bind(PaymentStatus::Failed.as_str())
        .bind(payment_id)
        .bind(PaymentStatus::Created.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn complete_payment(
        &self,
        payment: &Payment,
        payment_id: &str,
        duration_days: i32,
        now: OffsetDateTime,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, payment_id = $3
            WHERE order_id = $1 AND status <> $2
            "#,
        )
        .bind(&payment.order_id)
        .bind(PaymentStatus::Paid.as_str())
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (user_id, plan_id, start_date, expiry_date, is_trial, trial_used, admin_override)
            VALUES ($1, $2, $3, $3 + make_interval(days => $4), FALSE, FALSE, FALSE)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                start_date = EXCLUDED.start_date,
                expiry_date = GREATEST(EXCLUDED.start_date, COALESCE(user_subscriptions.expiry_date, EXCLUDED.start_date))
                              + make_interval(days => $4),
                is_trial = FALSE
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.plan_id)
        .bind(now)
        .bind(duration_days)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_subscription(&self, user_id: Uuid) -> DbResult<Option<UserSubscription>> {
        let sub = sqlx::query_as::<_, UserSubscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sub)
    }

    async fn insert_subscription_if_absent(&self, s: &UserSubscription) -> DbResult<UserSubscription> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sub = sqlx::query_as::<_, UserSubscription>(&format!(
            r#"
            INSERT INTO user_subscriptions ({SUBSCRIPTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET user_id = user_subscriptions.user_id
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(s.user_id)
        .bind(s.plan_id)
        .bind(s.start_date)
        .bind(s.expiry_date)
        .bind(s.is_trial)
        .bind(s.trial_used)
        .bind(s.admin_override)
        .fetch_one(&self.pool)
        .await?;
        Ok(sub)
    }

    async fn save_subscription(&self, s: &UserSubscription) -> DbResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO user_subscriptions ({SUBSCRIPTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                start_date = EXCLUDED.start_date,
                expiry_date = EXCLUDED.expiry_date,
                is_trial = EXCLUDED.is_trial,
                trial_used = EXCLUDED.trial_used
            "#
        ))
        .bind(s.user_id)
        .bind(s.plan_id)
        .bind(s.start_date)
        .bind(s.expiry_date)
        .bind(s.is_trial)
        .bind(s.trial_used)
        .bind(s.admin_override)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
