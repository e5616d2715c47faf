use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{error::FieldErrors, validation};

/// A shop: the unit of data isolation.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub contact_phone: String,
    pub contact_email: Option<String>,
    pub language: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn default_language() -> String {
    "en".into()
}

/// Writable shop attributes, used by registration and by the shop update.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl ShopDraft {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        validation::required(&mut errors, "name", &self.name, 255);
        if self.address.chars().count() > 500 {
            errors.add("address", "Ensure this field has no more than 500 characters.");
        }
        if self.contact_phone.chars().count() > 20 {
            errors.add("contact_phone", "Ensure this field has no more than 20 characters.");
        }
        validation::optional_email(&mut errors, "contact_email", self.contact_email.as_deref());
        let lang = self.language.trim();
        if lang.len() < 2 || lang.len() > 10 || !lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            errors.add("language", "Enter a valid language code.");
        }
        errors.into_result()
    }

    pub fn into_shop(self) -> Shop {
        let mut shop = Shop {
            id: Uuid::new_v4(),
            name: String::new(),
            address: String::new(),
            contact_phone: String::new(),
            contact_email: None,
            language: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        shop.apply(self);
        shop
    }
}

impl Shop {
    /// Overwrites the writable attributes; id and creation time never change.
    pub fn apply(&mut self, draft: ShopDraft) {
        self.name = draft.name.trim().to_string();
        self.address = draft.address.trim().to_string();
        self.contact_phone = draft.contact_phone.trim().to_string();
        self.contact_email = draft
            .contact_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        self.language = draft.language.trim().to_lowercase();
    }
}
