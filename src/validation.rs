use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::FieldErrors;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9@.+_-]{3,150}$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn required(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_len} characters."),
        );
    }
}

pub fn optional_email(errors: &mut FieldErrors, field: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        if !is_valid_email(v) {
            errors.add(field, "Enter a valid email address.");
        }
    }
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Decimal) {
    if value.is_sign_negative() && !value.is_zero() {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("alice@acme.in"));
        assert!(!is_valid_email("alice@acme"));
        assert!(!is_valid_email("not an email"));
    }

    #[test]
    fn usernames() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("bob.shop_1"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("has space"));
    }

    #[test]
    fn required_reports_blank_and_too_long() {
        let mut errors = FieldErrors::new();
        required(&mut errors, "name", "   ", 10);
        required(&mut errors, "address", "x".repeat(11).as_str(), 10);
        required(&mut errors, "phone", "123", 10);
        assert!(errors.contains("name"));
        assert!(errors.contains("address"));
        assert!(!errors.contains("phone"));
    }

    #[test]
    fn negative_amounts_rejected() {
        let mut errors = FieldErrors::new();
        non_negative(&mut errors, "price", Decimal::new(-1, 2));
        non_negative(&mut errors, "stock", Decimal::ZERO);
        assert!(errors.contains("price"));
        assert!(!errors.contains("stock"));
    }
}
