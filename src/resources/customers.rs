use async_trait::async_trait;
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

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CustomerDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
}

impl Resource for Customer {
    const NAME: &'static str = "Customer";
    type Draft = CustomerDraft;

    fn id(&self) -> Uuid {
        self.id
    }
    fn shop_id(&self) -> Uuid {
        self.shop_id
    }
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn validate(draft: &CustomerDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::required(&mut errors, "name", &draft.name, 255);
        if draft.phone.chars().count() > 20 {
            errors.add("phone", "Ensure this field has no more than 20 characters.");
        }
        validation::optional_email(&mut errors, "email", draft.email.as_deref());
        errors.into_result()
    }

    fn from_draft(id: Uuid, shop_id: Uuid, draft: CustomerDraft) -> Self {
        let mut customer = Customer {
            id,
            shop_id,
            name: String::new(),
            phone: String::new(),
            email: None,
            address: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        customer.apply(draft);
        customer
    }

    fn apply(&mut self, draft: CustomerDraft) {
        self.name = draft.name.trim().to_string();
        self.phone = draft.phone.trim().to_string();
        self.email = draft
            .email
            .map(|e| validation::normalize_email(&e))
            .filter(|e| !e.is_empty());
        self.address = draft.address.trim().to_string();
    }

    fn repo(store: &dyn Store) -> &dyn ResourceRepo<Self> {
        store.customers()
    }
}

const COLUMNS: &str = "id, shop_id, name, phone, email, address, created_at";

#[async_trait]
impl ResourceRepo<Customer> for PgStore {
    async fn list(&self, shop_id: Uuid, page: Pagination) -> DbResult<Vec<Customer>> {
        let rows = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {COLUMNS} FROM customers
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

    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<Customer>> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {COLUMNS} FROM customers WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, c: &Customer) -> DbResult<Customer> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers (id, shop_id, name, phone, email, address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(c.id)
        .bind(c.shop_id)
        .bind(&c.name)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.address)
        .bind(c.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, c: &Customer) -> DbResult<Option<Customer>> {
        let row = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET name = $3, phone = $4, email = $5, address = $6
            WHERE id = $1 AND shop_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(c.id)
        .bind(c.shop_id)
        .bind(&c.name)
        .bind(&c.phone)
        .bind(&c.email)
        .bind(&c.address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM customers WHERE id = $1 AND shop_id = $2")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
