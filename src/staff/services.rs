use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::Actor,
        password::hash_password_blocking,
        repo_types::{Role, User},
    },
    db::{DbError, Pagination, Store},
    error::{AppError, AppResult, FieldErrors},
    staff::dto::StaffDraft,
    validation,
};

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const OWNER_LOCKED: &str = "The shop owner cannot be changed from the staff list.";

fn taken(e: DbError) -> AppError {
    match e {
        DbError::UniqueViolation { constraint, .. } if constraint.contains("email") => {
            FieldErrors::single("email", "A user with that email already exists.").into()
        }
        DbError::UniqueViolation { .. } => FieldErrors::single("username", USERNAME_TAKEN).into(),
        other => other.into(),
    }
}

/// Other members of the actor's shop.
pub async fn list_staff(store: &dyn Store, actor: &Actor, page: Pagination) -> AppResult<Vec<User>> {
    let Some(shop_id) = actor.shop_id else {
        return Ok(Vec::new());
    };
    Ok(store
        .users()
        .list_in_shop(shop_id, actor.user_id, page.clamped())
        .await?)
}

pub async fn get_staff(store: &dyn Store, actor: &Actor, id: Uuid) -> AppResult<User> {
    let shop_id = actor.shop_id.ok_or(AppError::NotFound("User"))?;
    if id == actor.user_id {
        return Err(AppError::NotFound("User"));
    }
    store
        .users()
        .get_in_shop(shop_id, id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn create_staff(store: &dyn Store, actor: &Actor, draft: StaffDraft) -> AppResult<User> {
    let shop_id = actor.require_shop()?;
    let role = draft.validate(true)?;
    let username = draft.username.trim().to_string();
    if store.users().username_exists(&username).await? {
        return Err(FieldErrors::single("username", USERNAME_TAKEN).into());
    }

    let password = draft.password.unwrap_or_default();
    let password_hash = hash_password_blocking(password).await?;
    let user = User {
        id: Uuid::new_v4(),
        username,
        email: validation::normalize_email(&draft.email),
        password_hash,
        first_name: draft.first_name.trim().to_string(),
        last_name: draft.last_name.trim().to_string(),
        role,
        is_active: draft.is_active,
        is_superuser: false,
        shop_id: Some(shop_id),
        created_at: OffsetDateTime::now_utc(),
    };
    let created = store.users().insert(&user).await.map_err(taken)?;
    info!(user_id = %created.id, shop_id = %shop_id, role = created.role.as_str(), "staff member created");
    Ok(created)
}

pub async fn update_staff(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    draft: StaffDraft,
) -> AppResult<User> {
    let mut member = get_staff(store, actor, id).await?;
    if member.role == Role::Owner {
        warn!(target_id = %id, "attempt to edit shop owner through staff list");
        return Err(AppError::Forbidden(OWNER_LOCKED.into()));
    }
    let role = draft.validate(false)?;

    member.username = draft.username.trim().to_string();
    member.email = validation::normalize_email(&draft.email);
    member.first_name = draft.first_name.trim().to_string();
    member.last_name = draft.last_name.trim().to_string();
    member.role = role;
    member.is_active = draft.is_active;
    if let Some(password) = draft.password.filter(|p| !p.is_empty()) {
        member.password_hash = hash_password_blocking(password).await?;
    }

    let updated = store
        .users()
        .update_in_shop(&member)
        .await
        .map_err(taken)?
        .ok_or(AppError::NotFound("User"))?;
    info!(user_id = %updated.id, "staff member updated");
    Ok(updated)
}

pub async fn delete_staff(store: &dyn Store, actor: &Actor, id: Uuid) -> AppResult<()> {
    let member = get_staff(store, actor, id).await?;
    if member.role == Role::Owner {
        return Err(AppError::Forbidden(OWNER_LOCKED.into()));
    }
    let shop_id = actor.require_shop()?;
    if !store.users().delete_in_shop(shop_id, id).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = %id, "staff member removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        auth::password::verify_password,
        db::memory::MemoryStore,
        shops::{dto::RegisterShopRequest, registration::register_shop},
    };

    async fn shop_with_owner(store: &MemoryStore, owner: &str) -> Actor {
        let req: RegisterShopRequest = serde_json::from_value(json!({
            "shop": { "name": format!("{owner}'s shop") },
            "owner": { "username": owner, "password": "pw" }
        }))
        .unwrap();
        let out = register_shop(store, req).await.unwrap();
        Actor::from(&out.owner)
    }

    fn draft(value: serde_json::Value) -> StaffDraft {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_and_list_exclude_the_actor() {
        let store = MemoryStore::default();
        let alice = shop_with_owner(&store, "alice").await;

        let bob = create_staff(&store, &alice, draft(json!({ "username": "bob", "password": "pw2", "role": "shopkeeper" })))
            .await
            .unwrap();
        assert_eq!(bob.shop_id, alice.shop_id);
        assert_eq!(bob.role, Role::Shopkeeper);
        assert!(verify_password("pw2", &bob.password_hash).unwrap());

        let listed = list_staff(&store, &alice, Pagination::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "bob");

        assert!(matches!(
            get_staff(&store, &alice, alice.user_id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn members_of_other_shops_are_invisible() {
        let store = MemoryStore::default();
        let alice = shop_with_owner(&store, "alice").await;
        let zed = shop_with_owner(&store, "zed").await;
        let bob = create_staff(&store, &alice, draft(json!({ "username": "bob", "password": "pw" })))
            .await
            .unwrap();

        assert!(list_staff(&store, &zed, Pagination::default()).await.unwrap().is_empty());
        assert!(matches!(get_staff(&store, &zed, bob.id).await, Err(AppError::NotFound(_))));
        let upd = update_staff(&store, &zed, bob.id, draft(json!({ "username": "bobby" }))).await;
        assert!(matches!(upd, Err(AppError::NotFound(_))));
        assert!(matches!(delete_staff(&store, &zed, bob.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_password_and_taken_username_are_field_errors() {
        let store = MemoryStore::default();
        let alice = shop_with_owner(&store, "alice").await;

        let err = create_staff(&store, &alice, draft(json!({ "username": "bob" }))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains("password")));

        let err = create_staff(&store, &alice, draft(json!({ "username": "alice", "password": "x" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.contains("username")));
    }

    #[tokio::test]
    async fn update_keeps_shop_and_rehashes_password() {
        let store = MemoryStore::default();
        let alice = shop_with_owner(&store, "alice").await;
        let bob = create_staff(&store, &alice, draft(json!({ "username": "bob", "password": "old" })))
            .await
            .unwrap();

        let updated = update_staff(
            &store,
            &alice,
            bob.id,
            draft(json!({ "username": "bob", "password": "new", "is_active": false, "shop_id": Uuid::new_v4() })),
        )
        .await
        .unwrap();
        assert_eq!(updated.shop_id, alice.shop_id);
        assert!(!updated.is_active);
        assert!(verify_password("new", &updated.password_hash).unwrap());

        let same_pw = update_staff(&store, &alice, bob.id, draft(json!({ "username": "bob" })))
            .await
            .unwrap();
        assert_eq!(same_pw.password_hash, updated.password_hash);
    }

    #[tokio::test]
    async fn owner_cannot_be_edited_or_removed_by_staff() {
        let store = MemoryStore::default();
        let alice = shop_with_owner(&store, "alice").await;
        let bob = create_staff(&store, &alice, draft(json!({ "username": "bob", "password": "pw", "role": "shopkeeper" })))
            .await
            .unwrap();
        let bob_actor = Actor::from(&bob);

        let err = update_staff(&store, &bob_actor, alice.user_id, draft(json!({ "username": "alice", "role": "staff" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(matches!(
            delete_staff(&store, &bob_actor, alice.user_id).await,
            Err(AppError::Forbidden(_))
        ));

        delete_staff(&store, &alice, bob.id).await.unwrap();
        assert!(list_staff(&store, &alice, Pagination::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shopless_actor_cannot_add_staff() {
        let store = MemoryStore::default();
        let loner = Actor {
            user_id: Uuid::new_v4(),
            username: "root".into(),
            role: Role::Staff,
            shop_id: None,
        };
        let err = create_staff(&store, &loner, draft(json!({ "username": "bob", "password": "pw" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoShop));
    }
}
