use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    db::{DbError, DbResult, Pagination, PgStore},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, role, \
                            is_active, is_superuser, shop_id, created_at";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DbResult<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>>;
    async fn username_exists(&self, username: &str) -> DbResult<bool>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> DbResult<()>;

    /// Members of `shop_id`, excluding `exclude` (the acting user).
    async fn list_in_shop(
        &self,
        shop_id: Uuid,
        exclude: Uuid,
        page: Pagination,
    ) -> DbResult<Vec<User>>;
    async fn get_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<User>>;
    async fn insert(&self, user: &User) -> DbResult<User>;
    /// Writes back a member; matches on both id and `user.shop_id`.
    async fn update_in_shop(&self, user: &User) -> DbResult<Option<User>>;
    async fn delete_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool>;
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_in_shop(
        &self,
        shop_id: Uuid,
        exclude: Uuid,
        page: Pagination,
    ) -> DbResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE shop_id = $1 AND id <> $2
            ORDER BY created_at ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(shop_id)
        .bind(exclude)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: &User) -> DbResult<User> {
        insert_user(&self.pool, user, "user").await
    }

    async fn update_in_shop(&self, user: &User) -> DbResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $3, email = $4, password_hash = $5, first_name = $6,
                last_name = $7, role = $8, is_active = $9
            WHERE id = $1 AND shop_id = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(user.shop_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::tagged("user", e))?;
        Ok(updated)
    }

    async fn delete_in_shop(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1 AND shop_id = $2")
            .bind(id)
            .bind(shop_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

/// Inserts a user on any executor, so registration can reuse it inside its
/// transaction. Unique violations are attributed to `entity`.
pub(crate) async fn insert_user<'e, E>(executor: E, user: &User, entity: &'static str) -> DbResult<User>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, username, email, password_hash, first_name, last_name,
                           role, is_active, is_superuser, shop_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(user.is_superuser)
    .bind(user.shop_id)
    .bind(user.created_at)
    .fetch_one(executor)
    .await
    .map_err(|e| DbError::tagged(entity, e))
}
