//! User creation and permission-holder lookup.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::db;
use crate::db::users::NewUser;
use crate::error::{AppError, AppResult};
use crate::models::user::{ExtraFields, User};
use crate::services::backends::{BackendArg, BackendRegistry, PermQuery};
use crate::services::password;
use crate::services::validators::{self, UnicodeUsernameValidator};

/// Options for [`UserManager::with_perm`].
#[derive(Debug, Clone)]
pub struct WithPermOptions {
    /// Filter on `is_active`; `None` returns both
    pub is_active: Option<bool>,
    pub include_superusers: bool,
    pub backend: Option<BackendArg>,
    pub obj: Option<i64>,
}

impl Default for WithPermOptions {
    fn default() -> Self {
        Self {
            is_active: Some(true),
            include_superusers: true,
            backend: None,
            obj: None,
        }
    }
}

/// Creates users and answers "who holds this permission".
#[derive(Clone)]
pub struct UserManager {
    db: DatabaseConnection,
    backends: Arc<BackendRegistry>,
}

impl UserManager {
    pub fn new(db: DatabaseConnection, backends: Arc<BackendRegistry>) -> Self {
        Self { db, backends }
    }

    pub fn normalize_email(email: Option<&str>) -> String {
        validators::normalize_email(email)
    }

    pub fn normalize_username(username: &str) -> String {
        validators::normalize_username(username)
    }

    /// Create and persist a regular user.
    pub async fn create_user(
        &self,
        username: &str,
        email: Option<&str>,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> AppResult<User> {
        let extra = ExtraFields {
            is_staff: Some(extra.is_staff.unwrap_or(false)),
            is_superuser: Some(extra.is_superuser.unwrap_or(false)),
            ..extra
        };
        self.create(username, email, password, extra).await
    }

    /// Create and persist a superuser. Passing either privilege flag as
    /// `false` is rejected before anything is written.
    pub async fn create_superuser(
        &self,
        username: &str,
        email: Option<&str>,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> AppResult<User> {
        if extra.is_staff == Some(false) {
            return Err(AppError::InvalidInput(
                "Superuser must have is_staff=True.".to_string(),
            ));
        }
        if extra.is_superuser == Some(false) {
            return Err(AppError::InvalidInput(
                "Superuser must have is_superuser=True.".to_string(),
            ));
        }
        let extra = ExtraFields {
            is_staff: Some(true),
            is_superuser: Some(true),
            ..extra
        };
        let user = self.create(username, email, password, extra).await?;
        info!(user_id = user.id, username = %user.username, "Superuser created");
        Ok(user)
    }

    async fn create(
        &self,
        username: &str,
        email: Option<&str>,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> AppResult<User> {
        if username.is_empty() {
            return Err(AppError::InvalidInput(
                "The given username must be set".to_string(),
            ));
        }

        let username = Self::normalize_username(username);
        UnicodeUsernameValidator.validate(&username)?;
        let email = Self::normalize_email(email);
        let first_name = extra.first_name.unwrap_or_default();
        let last_name = extra.last_name.unwrap_or_default();
        check_name_length("first_name", &first_name)?;
        check_name_length("last_name", &last_name)?;

        let hash = password::make_password_async(password.map(str::to_string)).await?;

        let user = db::users::insert(
            &self.db,
            NewUser {
                username,
                password: hash,
                first_name,
                last_name,
                email,
                is_staff: extra.is_staff.unwrap_or(false),
                is_superuser: extra.is_superuser.unwrap_or(false),
                is_active: extra.is_active.unwrap_or(true),
            },
        )
        .await?;

        info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Hash and store a new password. `None` makes the password unusable.
    pub async fn set_password(&self, user_id: i32, raw_password: Option<&str>) -> AppResult<()> {
        let hash = password::make_password_async(raw_password.map(str::to_string)).await?;
        if !db::users::update_password(&self.db, user_id, &hash).await? {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }
        info!(
            user_id,
            usable = raw_password.is_some(),
            "Password changed"
        );
        Ok(())
    }

    /// Look up a user by the username they log in with.
    pub async fn get_by_natural_key(&self, username: &str) -> AppResult<User> {
        let username = Self::normalize_username(username);
        db::users::find_by_username(&self.db, &username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}'", username)))
    }

    /// Users holding `perm`, answered by the selected backend.
    ///
    /// Without `options.backend` exactly one backend must be configured.
    /// A backend that cannot look permissions up yields an empty list.
    pub async fn with_perm(&self, perm: &str, options: WithPermOptions) -> AppResult<Vec<User>> {
        let backend = self.backends.select(options.backend.as_ref())?;
        let query = PermQuery {
            perm: perm.to_string(),
            is_active: options.is_active,
            include_superusers: options.include_superusers,
            obj: options.obj,
        };
        if let Some(obj) = query.obj
            && obj < 0
        {
            return Err(AppError::InvalidInput(format!(
                "obj_id must be non-negative (got {})",
                obj
            )));
        }
        Ok(backend.with_perm(&query).await?.unwrap_or_default())
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }
}

fn check_name_length(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() > validators::USERNAME_MAX_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Ensure {} has at most {} characters",
            field,
            validators::USERNAME_MAX_LENGTH
        )));
    }
    Ok(())
}
