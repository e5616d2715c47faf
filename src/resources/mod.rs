//! Shop-owned records (products, customers, invoices, tax profiles).
//!
//! Each record type implements [`Resource`]; [`scope`] is the only way the
//! HTTP layer reaches them, and it always pins reads and writes to the
//! acting user's shop.

pub mod customers;
pub mod handlers;
pub mod invoices;
pub mod products;
pub mod scope;
pub mod tax_profiles;

use std::cmp::Ordering;

use async_trait::async_trait;
use axum::Router;
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    db::{DbResult, Pagination, Store},
    error::FieldErrors,
    state::AppState,
};

pub trait Resource: Serialize + Clone + Send + Sync + 'static {
    /// Singular display name, used in "<name> not found".
    const NAME: &'static str;

    /// Client-writable attributes. Carries no shop reference: the owning
    /// shop always comes from the actor.
    type Draft: DeserializeOwned + Send + 'static;

    fn id(&self) -> Uuid;
    fn shop_id(&self) -> Uuid;
    fn created_at(&self) -> OffsetDateTime;

    fn validate(draft: &Self::Draft) -> Result<(), FieldErrors>;
    fn from_draft(id: Uuid, shop_id: Uuid, draft: Self::Draft) -> Self;
    /// Overwrites the writable attributes; id, shop and creation time stay.
    fn apply(&mut self, draft: Self::Draft);

    /// Listing order, newest first unless a type says otherwise.
    fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.created_at().cmp(&a.created_at())
    }

    fn repo(store: &dyn Store) -> &dyn ResourceRepo<Self>;
}

/// Storage for one resource type. Every call names the owning shop, and no
/// call can move a record to another shop.
#[async_trait]
pub trait ResourceRepo<R: Resource>: Send + Sync {
    async fn list(&self, shop_id: Uuid, page: Pagination) -> DbResult<Vec<R>>;
    async fn get(&self, shop_id: Uuid, id: Uuid) -> DbResult<Option<R>>;
    async fn insert(&self, record: &R) -> DbResult<R>;
    /// Matches on both `record.id()` and `record.shop_id()`.
    async fn update(&self, record: &R) -> DbResult<Option<R>>;
    async fn delete(&self, shop_id: Uuid, id: Uuid) -> DbResult<bool>;
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::resource_routes::<products::Product>("/products"))
        .merge(handlers::resource_routes::<customers::Customer>("/customers"))
        .merge(handlers::resource_routes::<invoices::Invoice>("/invoices"))
        .merge(handlers::resource_routes::<tax_profiles::TaxProfile>("/taxprofiles"))
}
