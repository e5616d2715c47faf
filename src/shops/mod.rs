pub mod dto;
pub mod handlers;
pub mod registration;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::registration_routes())
        .merge(handlers::shop_routes())
}
