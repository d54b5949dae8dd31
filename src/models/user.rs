//! User models: the persisted identity record and its request/response shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::identity::Identity;
use crate::services::mail::Mailer;
use crate::services::password;

/// User stored in database.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    /// Argon2 PHC string, or an unusable marker starting with `!`
    #[serde(skip)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub email_lower: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub const USERNAME_FIELD: &'static str = "username";
    pub const EMAIL_FIELD: &'static str = "email";
    pub const REQUIRED_FIELDS: &'static [&'static str] = &["email"];

    /// First name plus last name, with a space in between.
    pub fn get_full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn get_short_name(&self) -> &str {
        &self.first_name
    }

    /// Re-normalize the email and recompute its lower-cased lookup key.
    pub fn clean(&mut self) {
        self.email = crate::services::validators::normalize_email(Some(&self.email));
        self.email_lower = email_lower(&self.email);
    }

    pub fn has_usable_password(&self) -> bool {
        password::is_password_usable(&self.password)
    }

    pub fn set_unusable_password(&mut self) {
        self.password = password::make_unusable_password();
    }

    /// Send an email to this user.
    pub async fn email_user(
        &self,
        mailer: &dyn Mailer,
        subject: &str,
        message: &str,
        from_email: Option<&str>,
    ) -> AppResult<()> {
        mailer
            .send_mail(subject, message, from_email, std::slice::from_ref(&self.email))
            .await
    }
}

impl Identity for User {
    fn get_username(&self) -> &str {
        &self.username
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn set_password(&mut self, raw_password: Option<&str>) -> AppResult<()> {
        self.password = password::make_password(raw_password)?;
        Ok(())
    }

    fn check_password(&self, raw_password: &str) -> AppResult<bool> {
        Ok(password::verify_password(raw_password, &self.password))
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}

impl From<crate::entity::user::Model> for User {
    fn from(m: crate::entity::user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            password: m.password,
            first_name: m.first_name,
            last_name: m.last_name,
            email: m.email,
            email_lower: m.email_lower,
            is_staff: m.is_staff,
            is_superuser: m.is_superuser,
            is_active: m.is_active,
            last_login: m.last_login,
            date_joined: m.date_joined,
        }
    }
}

/// Lower-cased email used for case-insensitive uniqueness; `None` for blank emails.
pub fn email_lower(email: &str) -> Option<String> {
    if email.trim().is_empty() {
        None
    } else {
        Some(email.to_lowercase())
    }
}

/// Optional fields accepted by user creation. Unset flags take the
/// creation method's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtraFields {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_staff: Option<bool>,
    #[serde(default)]
    pub is_superuser: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Request to create a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// User info response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub has_usable_password: bool,
    pub last_login: Option<String>,
    pub date_joined: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.get_full_name(),
            has_usable_password: u.has_usable_password(),
            username: u.username,
            email: u.email,
            is_staff: u.is_staff,
            is_superuser: u.is_superuser,
            is_active: u.is_active,
            last_login: u.last_login.map(|d| d.to_rfc3339()),
            date_joined: u.date_joined.to_rfc3339(),
        }
    }
}
