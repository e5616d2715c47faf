use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    db::{Pagination, Store},
    error::{AppError, AppResult},
    resources::Resource,
};

/// Records of the actor's shop; an actor without a shop sees nothing.
pub async fn list<R: Resource>(
    store: &dyn Store,
    actor: &Actor,
    page: Pagination,
) -> AppResult<Vec<R>> {
    let Some(shop_id) = actor.shop_id else {
        debug!(user_id = %actor.user_id, resource = R::NAME, "no shop, empty listing");
        return Ok(Vec::new());
    };
    Ok(R::repo(store).list(shop_id, page.clamped()).await?)
}

/// A record of another shop is indistinguishable from a missing one.
pub async fn get<R: Resource>(store: &dyn Store, actor: &Actor, id: Uuid) -> AppResult<R> {
    let shop_id = actor.shop_id.ok_or(AppError::NotFound(R::NAME))?;
    R::repo(store)
        .get(shop_id, id)
        .await?
        .ok_or(AppError::NotFound(R::NAME))
}

pub async fn create<R: Resource>(store: &dyn Store, actor: &Actor, draft: R::Draft) -> AppResult<R> {
    let shop_id = actor.require_shop()?;
    R::validate(&draft)?;
    let record = R::from_draft(Uuid::new_v4(), shop_id, draft);
    let created = R::repo(store).insert(&record).await?;
    info!(resource = R::NAME, id = %created.id(), shop_id = %shop_id, "created");
    Ok(created)
}

pub async fn update<R: Resource>(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    draft: R::Draft,
) -> AppResult<R> {
    let mut record = get::<R>(store, actor, id).await?;
    R::validate(&draft)?;
    record.apply(draft);
    let updated = R::repo(store)
        .update(&record)
        .await?
        .ok_or(AppError::NotFound(R::NAME))?;
    info!(resource = R::NAME, id = %id, "updated");
    Ok(updated)
}

pub async fn delete<R: Resource>(store: &dyn Store, actor: &Actor, id: Uuid) -> AppResult<()> {
    let shop_id = actor.shop_id.ok_or(AppError::NotFound(R::NAME))?;
    if !R::repo(store).delete(shop_id, id).await? {
        return Err(AppError::NotFound(R::NAME));
    }
    info!(resource = R::NAME, id = %id, "deleted");
    Ok(())
}
