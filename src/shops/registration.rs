use tracing::{info, warn};

use crate::{
    auth::{
        password::hash_password_blocking,
        repo_types::{NewUser, Role},
    },
    db::{DbError, Store},
    error::{AppError, AppResult, FieldErrors},
    shops::dto::{AccountDraft, RegisterShopRequest, RegisterShopResponse},
};

const DUPLICATE_OWNER: &str = "An owner with this username already exists.";
const DUPLICATE_SHOPKEEPER: &str = "A shopkeeper with this username already exists.";
const DUPLICATE_ACCOUNT: &str = "A user with this username or email already exists.";

/// Creates a shop, its owner and (on request) a shopkeeper as one unit.
///
/// Every check that can be answered without writing runs first and reports
/// per-field errors. Anything the store rejects afterwards (a username or
/// email taken concurrently) rolls the whole registration back.
pub async fn register_shop(
    store: &dyn Store,
    req: RegisterShopRequest,
) -> AppResult<RegisterShopResponse> {
    let mut errors = FieldErrors::new();
    match &req.shop {
        Some(shop) => {
            if let Err(nested) = shop.validate() {
                errors.nest("shop", nested);
            }
        }
        None => errors.add("shop", "This field is required."),
    }
    match &req.owner {
        Some(owner) => {
            if let Err(nested) = owner.validate() {
                errors.nest("owner", nested);
            }
        }
        None => errors.add("owner", "This field is required."),
    }
    let shopkeeper_draft = req.shopkeeper.filter(|_| req.create_shopkeeper);
    if let Some(shopkeeper) = &shopkeeper_draft {
        if let Err(nested) = shopkeeper.validate() {
            errors.nest("shopkeeper", nested);
        }
    }
    errors.into_result()?;

    let (Some(shop_draft), Some(owner_draft)) = (req.shop, req.owner) else {
        return Err(AppError::Internal(anyhow::anyhow!("validated request lost its parts")));
    };

    if store.users().username_exists(owner_draft.username.trim()).await? {
        warn!("registration rejected: owner username taken");
        return Err(FieldErrors::single("owner", DUPLICATE_OWNER).into());
    }
    if let Some(shopkeeper) = &shopkeeper_draft {
        if store.users().username_exists(shopkeeper.username.trim()).await? {
            warn!("registration rejected: shopkeeper username taken");
            return Err(FieldErrors::single("shopkeeper", DUPLICATE_SHOPKEEPER).into());
        }
    }

    let shop = shop_draft.into_shop();
    let owner = provision(owner_draft, Role::Owner).await?.into_user(shop.id);
    let shopkeeper = match shopkeeper_draft {
        Some(draft) => Some(provision(draft, Role::Shopkeeper).await?.into_user(shop.id)),
        None => None,
    };

    match store.shops().register(&shop, &owner, shopkeeper.as_ref()).await {
        Ok(()) => {}
        Err(DbError::UniqueViolation { entity, constraint }) => {
            warn!(%entity, %constraint, "registration rolled back on unique violation");
            let field = match entity {
                "owner" | "shopkeeper" => entity,
                _ => "shop",
            };
            return Err(FieldErrors::single(field, DUPLICATE_ACCOUNT).into());
        }
        Err(e) => return Err(e.into()),
    }

    info!(
        shop_id = %shop.id,
        owner_id = %owner.id,
        shopkeeper_id = ?shopkeeper.as_ref().map(|u| u.id),
        "shop registered"
    );
    Ok(RegisterShopResponse {
        shop,
        owner,
        shopkeeper,
    })
}

async fn provision(draft: AccountDraft, role: Role) -> AppResult<NewUser> {
    let hash = hash_password_blocking(draft.password.clone()).await?;
    Ok(draft.into_new_user(role, hash))
}
