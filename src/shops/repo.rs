use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::{repo::insert_user, repo_types::User},
    db::{DbError, DbResult, PgStore},
    shops::repo_types::Shop,
};

const SHOP_COLUMNS: &str = "id, name, address, contact_phone, contact_email, language, created_at";

#[async_trait]
pub trait ShopRepo: Send + Sync {
    async fn get(&self, id: Uuid) -> DbResult<Option<Shop>>;
    async fn update(&self, shop: &Shop) -> DbResult<Option<Shop>>;
    /// Persists a new shop with its owner and optional shopkeeper as one
    /// unit: either all rows are written or none are.
    async fn register(&self, shop: &Shop, owner: &User, shopkeeper: Option<&User>) -> DbResult<()>;
}

#[async_trait]
impl ShopRepo for PgStore {
    async fn get(&self, id: Uuid) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(&format!("SELECT {SHOP_COLUMNS} FROM shops WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shop)
    }

    async fn update(&self, shop: &Shop) -> DbResult<Option<Shop>> {
        let updated = sqlx::query_as::<_, Shop>(&format!(
            r#"
            UPDATE shops
            SET name = $2, address = $3, contact_phone = $4, contact_email = $5, language = $6
            WHERE id = $1
            RETURNING {SHOP_COLUMNS}
            "#
        ))
        .bind(shop.id)
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(&shop.contact_phone)
        .bind(&shop.contact_email)
        .bind(&shop.language)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn register(&self, shop: &Shop, owner: &User, shopkeeper: Option<&User>) -> DbResult<()> {
        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO shops (id, name, address, contact_phone, contact_email, language, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(shop.id)
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(&shop.contact_phone)
        .bind(&shop.contact_email)
        .bind(&shop.language)
        .bind(shop.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::tagged("shop", e))?;

        insert_user(&mut *tx, owner, "owner").await?;
        if let Some(shopkeeper) = shopkeeper {
            insert_user(&mut *tx, shopkeeper, "shopkeeper").await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
