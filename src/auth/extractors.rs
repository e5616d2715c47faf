use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;
use uuid::Uuid;

use super::{
    jwt::AuthUser,
    repo_types::{Role, User},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

/// The authenticated user a request acts on behalf of.
///
/// Handed explicitly to every shop-scoped operation; nothing reads the
/// acting user from ambient request state.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub shop_id: Option<Uuid>,
}

impl Actor {
    /// The actor's shop, or `NoShop` for operations that need one.
    pub fn require_shop(&self) -> AppResult<Uuid> {
        self.shop_id.ok_or(AppError::NoShop)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            shop_id: user.shop_id,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;

        // Load fresh: the shop link and active flag may have changed since
        // the token was issued.
        let user = state
            .store
            .users()
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

        let actor = Actor::from(&user);
        debug!(
            user_id = %actor.user_id,
            username = %actor.username,
            role = actor.role.as_str(),
            "actor resolved"
        );
        Ok(actor)
    }
}
