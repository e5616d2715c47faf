use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{
    error::BoxDynError,
    postgres::{PgTypeInfo, PgValueRef, Postgres},
    Decode, FromRow, Type,
};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub duration_days: i32,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(PaymentStatus::Created),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl Type<Postgres> for PaymentStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for PaymentStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        PaymentStatus::parse(raw).ok_or_else(|| format!("unknown payment status {raw:?}").into())
    }
}

/// A gateway order placed by a user for a plan.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One per user. Valid while `now < expiry_date`, or always under an
/// administrative override.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserSubscription {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expiry_date: Option<OffsetDateTime>,
    pub is_trial: bool,
    pub trial_used: bool,
    pub admin_override: bool,
}

impl UserSubscription {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            plan_id: None,
            start_date: None,
            expiry_date: None,
            is_trial: false,
            trial_used: false,
            admin_override: false,
        }
    }

    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        self.admin_override || self.expiry_date.is_some_and(|exp| now < exp)
    }

    /// Remaining time is kept: the new period starts at the later of now
    /// and the current expiry.
    fn push_expiry(&mut self, now: OffsetDateTime, days: i64) {
        let base = self.expiry_date.filter(|exp| *exp > now).unwrap_or(now);
        self.start_date = Some(now);
        self.expiry_date = Some(base + Duration::days(days));
    }

    pub fn start_trial(&mut self, now: OffsetDateTime, days: i64) {
        self.push_expiry(now, days);
        self.is_trial = true;
        self.trial_used = true;
    }

    pub fn extend(&mut self, now: OffsetDateTime, plan_id: Uuid, days: i64) {
        self.push_expiry(now, days);
        self.plan_id = Some(plan_id);
        self.is_trial = false;
    }
}
