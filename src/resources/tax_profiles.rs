use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{DbResult, Pagination, PgStore, Store},
    error::FieldErrors,
    resources::{Resource, ResourceRepo},
    validation,
};

/// Per-shop tax and currency display settings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaxProfile {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub gst_enabled: bool,
    pub default_rate: Decimal,
    pub price_inclusive: bool,
    pub currency_symbol: String,
    pub decimal_places: i16,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn yes() -> bool {
    true
}

fn default_rate() -> Decimal {
    Decimal::new(18, 0)
}

fn default_symbol() -> String {
    "₹".into()
}

fn default_places() -> i16 {
    2
}

#[derive(Debug, Deserialize)]
pub struct TaxProfileDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default = "yes")]
    pub gst_enabled: bool,
    #[serde(default = "default_rate")]
    pub default_rate: Decimal,
    #[serde(default)]
    pub price_inclusive: bool,
    #[serde(default = "default_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_places")]
    pub decimal_places: i16,
}

impl Resource for TaxProfile {
    const NAME: &'static str = "Tax profile";
    type Draft = TaxProfileDraft;

    fn id(&self) -> Uuid {
        self.id
    }
    fn shop_id(&self) -> Uuid {
        self.shop_id
    }
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn validate(draft: &TaxProfileDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::required(&mut errors, "name", &draft.name, 100);
        validation::non_negative(&mut errors, "default_rate", draft.default_rate);
        if draft.default_rate > Decimal::ONE_HUNDRED {
            errors.add("default_rate", "Ensure this value is less than or equal to 100.");
        }
        validation::required(&mut errors, "currency_symbol", &draft.currency_symbol, 8);
        if !(0..=4).contains(&draft.decimal_places) {
            errors.add("decimal_places", "Ensure this value is between 0 and 4.");
        }
        errors.into_result()
    }

    fn from_draft(id: Uuid, shop_id: Uuid, draft: TaxProfileDraft) -> Self {
        let mut profile = TaxProfile {
            id,
            shop_id,
            name: String::new(),
            gst_enabled: true,
            default_rate: default_rate(),
            price_inclusive: false,
            currency_symbol: default_symbol(),
            decimal_places: default_places(),
            created_at: OffsetDateTime::now_utc(),
        };
        profile.apply(draft);
        profile
    }

    fn apply(&mut self, draft: TaxProfileDraft) {
        self.name = draft.name.trim().to_string();
        self.gst_enabled = draft.gst_enabled;
        self.default_rate = draft.default_rate.round_dp(2);
        self.price_inclusive = draft.price_inclusive;
        self.currency_symbol = draft.currency_symbol.trim().to_string();
        self.decimal_places = draft.decimal_places;
    }

    fn repo(store: &dyn Store) -> &dyn ResourceRepo<Self> {
        store.tax_profiles()
    }
}

const COLUMNS: &str = "id, shop_id, name, gst_enabled, default_rate, price_inclusive, \
                       currency_symbol, decimal_places, created_at";

#[async_trait]
impl ResourceRepo<TaxProfile> for PgStore {
    async fn list(&self, shop_id: Uuid, page: Pagination) -> DbResult<Vec<TaxProfile>> {
        let rows = sqlx::query_as::<_, TaxProfile>(&format!(
            r#"
            SELECT {COLUMNS} FROM tax_profiles
            WHERE shop_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(shop_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<TaxProfile>> {
        let row = sqlx::query_as::<_, TaxProfile>(&format!(
            "SELECT {COLUMNS} FROM tax_profiles WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, t: &TaxProfile) -> DbResult<TaxProfile> {
        let row = sqlx::query_as::<_, TaxProfile>(&format!(
            r#"
            INSERT INTO tax_profiles (id, shop_id, name, gst_enabled, default_rate,
                                      price_inclusive, currency_symbol, decimal_places, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(t.id)
        .bind(t.shop_id)
        .bind(&t.name)
        .bind(t.gst_enabled)
        .bind(t.default_rate)
        .bind(t.price_inclusive)
        .bind(&t.currency_symbol)
        .bind(t.decimal_places)
        .bind(t.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, t: &TaxProfile) -> DbResult<Option<TaxProfile>> {
        let row = sqlx::query_as::<_, TaxProfile>(&format!(
            r#"
            UPDATE tax_profiles
            SET name = $3, gst_enabled = $4, default_rate = $5, price_inclusive = $6,
                currency_symbol = $7, decimal_places = $8
            WHERE id = $1 AND shop_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(t.id)
        .bind(t.shop_id)
        .bind(&t.name)
        .bind(t.gst_enabled)
        .bind(t.default_rate)
        .bind(t.price_inclusive)
        .bind(&t.currency_symbol)
        .bind(t.decimal_places)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM tax_profiles WHERE id = $1 AND shop_id = $2")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
