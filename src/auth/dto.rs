use serde::{Deserialize, Serialize};

use crate::{auth::repo_types::User, shops::repo_types::Shop};

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Snapshot of the acting user and their shop.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub shop: Option<Shop>,
}
