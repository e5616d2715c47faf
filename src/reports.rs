use async_trait::async_trait;
use axum::{extract::State, routing::get, Json, Router};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    db::{DbResult, PgStore},
    error::AppResult,
    state::AppState,
};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct SalesSummary {
    pub total_sales: Decimal,
    pub total_invoices: i64,
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn sales_summary(&self, shop_id: Uuid) -> DbResult<SalesSummary>;
}

#[async_trait]
impl ReportRepo for PgStore {
    async fn sales_summary(&self, shop_id: Uuid) -> DbResult<SalesSummary> {
        let summary = sqlx::query_as::<_, SalesSummary>(
            r#"
            SELECT COALESCE(SUM(grand_total), 0) AS total_sales,
                   COUNT(id) AS total_invoices
            FROM invoices
            WHERE shop_id = $1
            "#,
        )
        .bind(shop_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/reports/sales-summary", get(sales_summary))
}

#[instrument(skip(state, actor), fields(user_id = %actor.user_id))]
pub async fn sales_summary(
    State(state): State<AppState>,
    actor: Actor,
) -> AppResult<Json<SalesSummary>> {
    let shop_id = actor.require_shop()?;
    Ok(Json(state.store.reports().sales_summary(shop_id).await?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        auth::repo_types::Role,
        db::{memory::MemoryStore, Store},
        error::AppError,
        resources::{invoices::Invoice, scope},
    };

    #[tokio::test]
    async fn sums_only_own_shop_invoices() {
        let store = MemoryStore::default();
        let mine = Actor {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            role: Role::Owner,
            shop_id: Some(Uuid::new_v4()),
        };
        let theirs = Actor {
            shop_id: Some(Uuid::new_v4()),
            ..mine.clone()
        };
        for (actor, total) in [(&mine, "118.00"), (&mine, "20.50"), (&theirs, "999")] {
            let draft = serde_json::from_value(json!({
                "invoice_number": "INV",
                "grand_total": total
            }))
            .unwrap();
            scope::create::<Invoice>(&store, actor, draft).await.unwrap();
        }

        let summary = store
            .reports()
            .sales_summary(mine.shop_id.unwrap())
            .await
            .unwrap();
        assert_eq!(summary.total_invoices, 2);
        assert_eq!(summary.total_sales, Decimal::new(13850, 2));

        let empty = store.reports().sales_summary(Uuid::new_v4()).await.unwrap();
        assert_eq!(empty.total_sales, Decimal::ZERO);
        assert_eq!(empty.total_invoices, 0);
    }

    #[test]
    fn shopless_actor_is_refused() {
        let actor = Actor {
            user_id: Uuid::new_v4(),
            username: "root".into(),
            role: Role::Staff,
            shop_id: None,
        };
        assert!(matches!(actor.require_shop(), Err(AppError::NoShop)));
    }
}
