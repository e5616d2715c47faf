use std::cmp::Ordering;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    db::{DbResult, Pagination, PgStore, Store},
    error::FieldErrors,
    resources::{Resource, ResourceRepo},
    validation,
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub invoice_date: Date,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceDraft {
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub customer_name: String,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub invoice_date: Option<Date>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default)]
    pub grand_total: Decimal,
    #[serde(default)]
    pub notes: String,
}

impl Resource for Invoice {
    const NAME: &'static str = "Invoice";
    type Draft = InvoiceDraft;

    fn id(&self) -> Uuid {
        self.id
    }
    fn shop_id(&self) -> Uuid {
        self.shop_id
    }
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn validate(draft: &InvoiceDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::required(&mut errors, "invoice_number", &draft.invoice_number, 64);
        if draft.customer_name.chars().count() > 255 {
            errors.add("customer_name", "Ensure this field has no more than 255 characters.");
        }
        validation::non_negative(&mut errors, "subtotal", draft.subtotal);
        validation::non_negative(&mut errors, "tax_amount", draft.tax_amount);
        validation::non_negative(&mut errors, "grand_total", draft.grand_total);
        errors.into_result()
    }

    fn from_draft(id: Uuid, shop_id: Uuid, draft: InvoiceDraft) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut invoice = Invoice {
            id,
            shop_id,
            invoice_number: String::new(),
            customer_name: String::new(),
            invoice_date: now.date(),
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            notes: String::new(),
            created_at: now,
        };
        invoice.apply(draft);
        invoice
    }

    fn apply(&mut self, draft: InvoiceDraft) {
        self.invoice_number = draft.invoice_number.trim().to_string();
        self.customer_name = draft.customer_name.trim().to_string();
        if let Some(date) = draft.invoice_date {
            self.invoice_date = date;
        }
        self.subtotal = draft.subtotal.round_dp(2);
        self.tax_amount = draft.tax_amount.round_dp(2);
        self.grand_total = draft.grand_total.round_dp(2);
        self.notes = draft.notes;
    }

    fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.invoice_date
            .cmp(&a.invoice_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    }

    fn repo(store: &dyn Store) -> &dyn ResourceRepo<Self> {
        store.invoices()
    }
}

const COLUMNS: &str = "id, shop_id, invoice_number, customer_name, invoice_date, subtotal, \
                       tax_amount, grand_total, notes, created_at";

#[async_trait]
impl ResourceRepo<Invoice> for PgStore {
    async fn list(&self, shop_id: Uuid, page: Pagination) -> DbResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {COLUMNS} FROM invoices
            WHERE shop_id = $1
            ORDER BY invoice_date DESC, created_at DESC
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

    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {COLUMNS} FROM invoices WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, inv: &Invoice) -> DbResult<Invoice> {
        let row = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (id, shop_id, invoice_number, customer_name, invoice_date,
                                  subtotal, tax_amount, grand_total, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(inv.id)
        .bind(inv.shop_id)
        .bind(&inv.invoice_number)
        .bind(&inv.customer_name)
        .bind(inv.invoice_date)
        .bind(inv.subtotal)
        .bind(inv.tax_amount)
        .bind(inv.grand_total)
        .bind(&inv.notes)
        .bind(inv.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, inv: &Invoice) -> DbResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET invoice_number = $3, customer_name = $4, invoice_date = $5,
                subtotal = $6, tax_amount = $7, grand_total = $8, notes = $9
            WHERE id = $1 AND shop_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(inv.id)
        .bind(inv.shop_id)
        .bind(&inv.invoice_number)
        .bind(&inv.customer_name)
        .bind(inv.invoice_date)
        .bind(inv.subtotal)
        .bind(inv.tax_amount)
        .bind(inv.grand_total)
        .bind(&inv.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM invoices WHERE id = $1 AND shop_id = $2")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
