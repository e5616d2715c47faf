use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    auth::repo::UserRepo,
    billing::repo::BillingRepo,
    feedback::FeedbackRepo,
    reports::ReportRepo,
    resources::{
        customers::Customer, invoices::Invoice, products::Product, tax_profiles::TaxProfile,
        ResourceRepo,
    },
    shops::repo::ShopRepo,
};

#[cfg(test)]
pub mod memory;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} violates unique constraint {constraint}")]
    UniqueViolation {
        entity: &'static str,
        constraint: String,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Classifies a driver error, attributing unique violations to `entity`.
    pub fn tagged(entity: &'static str, e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db.constraint().unwrap_or_default().to_string();
                return DbError::UniqueViolation { entity, constraint };
            }
        }
        DbError::Sqlx(e)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
            offset: self.offset.max(0),
        }
    }
}

/// Every repository the service talks to. Shop-owned data is only reachable
/// through methods that take the owning shop id.
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserRepo;
    fn shops(&self) -> &dyn ShopRepo;
    fn products(&self) -> &dyn ResourceRepo<Product>;
    fn customers(&self) -> &dyn ResourceRepo<Customer>;
    fn invoices(&self) -> &dyn ResourceRepo<Invoice>;
    fn tax_profiles(&self) -> &dyn ResourceRepo<TaxProfile>;
    fn reports(&self) -> &dyn ReportRepo;
    fn billing(&self) -> &dyn BillingRepo;
    fn feedback(&self) -> &dyn FeedbackRepo;
}

#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl Store for PgStore {
    fn users(&self) -> &dyn UserRepo {
        self
    }
    fn shops(&self) -> &dyn ShopRepo {
        self
    }
    fn products(&self) -> &dyn ResourceRepo<Product> {
        self
    }
    fn customers(&self) -> &dyn ResourceRepo<Customer> {
        self
    }
    fn invoices(&self) -> &dyn ResourceRepo<Invoice> {
        self
    }
    fn tax_profiles(&self) -> &dyn ResourceRepo<TaxProfile> {
        self
    }
    fn reports(&self) -> &dyn ReportRepo {
        self
    }
    fn billing(&self) -> &dyn BillingRepo {
        self
    }
    fn feedback(&self) -> &dyn FeedbackRepo {
        self
    }
}
