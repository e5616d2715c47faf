use serde::Deserialize;

use crate::{auth::repo_types::Role, error::FieldErrors, validation};

fn active() -> bool {
    true
}

/// Writable member attributes. The shop always comes from the actor.
#[derive(Debug, Deserialize)]
pub struct StaffDraft {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub password: Option<String>,
}

impl StaffDraft {
    /// Validates the draft and resolves its role (`staff` when omitted).
    pub fn validate(&self, creating: bool) -> Result<Role, FieldErrors> {
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
        validation::optional_email(&mut errors, "email", Some(&self.email));

        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => Some(Role::Staff),
            Some(raw) => match Role::parse(raw) {
                Some(Role::Owner) => {
                    errors.add("role", "Owners can only be created by shop registration.");
                    None
                }
                Some(role) => Some(role),
                None => {
                    errors.add("role", format!("\"{raw}\" is not a valid choice."));
                    None
                }
            },
        };

        let has_password = self.password.as_deref().is_some_and(|p| !p.is_empty());
        if creating && !has_password {
            errors.add("password", "This field is required.");
        }

        errors.into_result()?;
        Ok(role.unwrap_or(Role::Staff))
    }
}
