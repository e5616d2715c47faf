use serde::{Deserialize, Serialize};

use crate::{
    auth::repo_types::{NewUser, Role, User},
    error::FieldErrors,
    shops::repo_types::{Shop, ShopDraft},
    validation,
};

/// Credentials and profile of an account minted during registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDraft {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl AccountDraft {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if !validation::is_valid_username(username) {
            errors.add(
                "username",
                "Enter a valid username of 3-150 letters, digits and @/./+/-/_ characters.",
            );
        }
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        validation::optional_email(&mut errors, "email", Some(&self.email));
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.chars().count() > 150 {
                errors.add(field, "Ensure this field has no more than 150 characters.");
            }
        }
        errors.into_result()
    }

    pub fn into_new_user(self, role: Role, password_hash: String) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            email: validation::normalize_email(&self.email),
            password_hash,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            role,
            is_active: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterShopRequest {
    #[serde(default)]
    pub shop: Option<ShopDraft>,
    #[serde(default)]
    pub owner: Option<AccountDraft>,
    #[serde(default)]
    pub create_shopkeeper: bool,
    #[serde(default)]
    pub shopkeeper: Option<AccountDraft>,
}

#[derive(Debug, Serialize)]
pub struct RegisterShopResponse {
    pub shop: Shop,
    pub owner: User,
    pub shopkeeper: Option<User>,
}
