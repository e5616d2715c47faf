mod dto;
pub mod handlers;
pub mod services;
pub mod token;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::reset_routes()
}
