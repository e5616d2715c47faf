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

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub description: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ProductDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
}

impl Resource for Product {
    const NAME: &'static str = "Product";
    type Draft = ProductDraft;

    fn id(&self) -> Uuid {
        self.id
    }
    fn shop_id(&self) -> Uuid {
        self.shop_id
    }
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn validate(draft: &ProductDraft) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::required(&mut errors, "name", &draft.name, 255);
        if draft.sku.as_deref().is_some_and(|s| s.chars().count() > 64) {
            errors.add("sku", "Ensure this field has no more than 64 characters.");
        }
        match draft.price {
            Some(price) => validation::non_negative(&mut errors, "price", price),
            None => errors.add("price", "This field is required."),
        }
        if draft.stock_quantity < 0 {
            errors.add("stock_quantity", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result()
    }

    fn from_draft(id: Uuid, shop_id: Uuid, draft: ProductDraft) -> Self {
        let mut product = Product {
            id,
            shop_id,
            name: String::new(),
            sku: None,
            description: String::new(),
            price: Decimal::ZERO,
            stock_quantity: 0,
            created_at: OffsetDateTime::now_utc(),
        };
        product.apply(draft);
        product
    }

    fn apply(&mut self, draft: ProductDraft) {
        self.name = draft.name.trim().to_string();
        self.sku = draft.sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.description = draft.description;
        self.price = draft.price.unwrap_or_default().round_dp(2);
        self.stock_quantity = draft.stock_quantity;
    }

    fn repo(store: &dyn Store) -> &dyn ResourceRepo<Self> {
        store.products()
    }
}

const COLUMNS: &str = "id, shop_id, name, sku, description, price, stock_quantity, created_at";

#[async_trait]
impl ResourceRepo<Product> for PgStore {
    async fn list(&self, shop_id: Uuid, page: Pagination) -> DbResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {COLUMNS} FROM products
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

    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {COLUMNS} FROM products WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert(&self, p: &Product) -> DbResult<Product> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, shop_id, name, sku, description, price, stock_quantity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(p.id)
        .bind(p.shop_id)
        .bind(&p.name)
        .bind(&p.sku)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.stock_quantity)
        .bind(p.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, p: &Product) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = $3, sku = $4, description = $5, price = $6, stock_quantity = $7
            WHERE id = $1 AND shop_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(p.id)
        .bind(p.shop_id)
        .bind(&p.name)
        .bind(&p.sku)
        .bind(&p.description)
        .bind(p.price)
        .bind(p.stock_quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1 AND shop_id = $2")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_required_and_rounded() {
        let draft: ProductDraft = serde_json::from_str(r#"{"name":"Tea"}"#).unwrap();
        let errors = Product::validate(&draft).unwrap_err();
        assert!(errors.contains("price"));

        let draft: ProductDraft =
            serde_json::from_str(r#"{"name":"Tea","price":"10.556","sku":"  "}"#).unwrap();
        assert!(Product::validate(&draft).is_ok());
        let p = Product::from_draft(Uuid::new_v4(), Uuid::new_v4(), draft);
        assert_eq!(p.price, Decimal::new(1056, 2));
        assert_eq!(p.sku, None);
    }

    #[test]
    fn negative_stock_rejected() {
        let draft: ProductDraft =
            serde_json::from_str(r#"{"name":"Tea","price":"1","stock_quantity":-3}"#).unwrap();
        assert!(Product::validate(&draft).unwrap_err().contains("stock_quantity"));
    }
}
