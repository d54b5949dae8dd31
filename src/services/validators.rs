//! Username and email normalization and validation.

use unicode_normalization::UnicodeNormalization;

use crate::error::{AppError, AppResult};

pub const USERNAME_MAX_LENGTH: usize = 150;

/// Unicode NFKC normalization, so visually identical names compare equal.
pub fn normalize_username(username: &str) -> String {
    username.nfkc().collect()
}

/// Lower-case the domain part of an email address. Blank input becomes "".
pub fn normalize_email(email: Option<&str>) -> String {
    let email = email.unwrap_or("").trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Accepts letters, digits and `@ . + - _`, up to 150 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeUsernameValidator;

impl UnicodeUsernameValidator {
    pub const MESSAGE: &'static str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

    pub fn validate(&self, username: &str) -> AppResult<()> {
        if username.is_empty() {
            return Err(AppError::InvalidInput(
                "The given username must be set".to_string(),
            ));
        }
        if username.chars().count() > USERNAME_MAX_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "Ensure the username has at most {} characters",
                USERNAME_MAX_LENGTH
            )));
        }
        let valid = username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '@' | '.' | '+' | '-'));
        if !valid {
            return Err(AppError::InvalidInput(Self::MESSAGE.to_string()));
        }
        Ok(())
    }
}
