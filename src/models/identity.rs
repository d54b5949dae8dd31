//! Identity capability contract and the anonymous identity.
//!
//! A request resolves to either a persisted [`User`] or [`AnonymousUser`].
//! Both satisfy [`Identity`]; [`RequestIdentity`] is the tagged union the web
//! layer passes around.

use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::models::group::Group;
use crate::models::permission::UserPermission;
use crate::models::user::User;

const NO_DB_REPRESENTATION: &str = "There is no database representation for AnonymousUser";

/// Capabilities every identity provides to the authentication layer.
pub trait Identity {
    fn get_username(&self) -> &str;

    fn is_authenticated(&self) -> bool;

    fn is_anonymous(&self) -> bool {
        !self.is_authenticated()
    }

    /// Hash and store a new password. `None` stores an unusable password.
    fn set_password(&mut self, raw_password: Option<&str>) -> AppResult<()>;

    fn check_password(&self, raw_password: &str) -> AppResult<bool>;
}

/// Identity of an unauthenticated request. Never persisted; every value is
/// equal to every other and hashes identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnonymousUser;

impl AnonymousUser {
    pub const USERNAME: &'static str = "";

    pub fn id(&self) -> Option<i32> {
        None
    }

    pub fn is_staff(&self) -> bool {
        false
    }

    pub fn is_active(&self) -> bool {
        false
    }

    pub fn is_superuser(&self) -> bool {
        false
    }

    pub fn groups(&self) -> Vec<Group> {
        Vec::new()
    }

    pub fn user_permissions(&self) -> Vec<UserPermission> {
        Vec::new()
    }

    pub fn get_group_permissions(&self, _obj: Option<i64>) -> BTreeSet<String> {
        BTreeSet::new()
    }

    pub fn get_all_permissions(&self, _obj: Option<i64>) -> BTreeSet<String> {
        BTreeSet::new()
    }

    pub fn has_perm(&self, _perm: &str, _obj: Option<i64>) -> bool {
        false
    }

    /// Always false, including for an empty list.
    pub fn has_perms(&self, _perm_list: &[&str], _obj: Option<i64>) -> bool {
        false
    }

    pub fn has_module_perms(&self, _app_label: &str) -> bool {
        false
    }

    pub fn save(&self) -> AppResult<()> {
        Err(AppError::NotSupported(NO_DB_REPRESENTATION.to_string()))
    }

    pub fn delete(&self) -> AppResult<()> {
        Err(AppError::NotSupported(NO_DB_REPRESENTATION.to_string()))
    }
}

impl Identity for AnonymousUser {
    fn get_username(&self) -> &str {
        Self::USERNAME
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn set_password(&mut self, _raw_password: Option<&str>) -> AppResult<()> {
        Err(AppError::NotSupported(NO_DB_REPRESENTATION.to_string()))
    }

    fn check_password(&self, _raw_password: &str) -> AppResult<bool> {
        Err(AppError::NotSupported(NO_DB_REPRESENTATION.to_string()))
    }
}

impl std::fmt::Display for AnonymousUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnonymousUser")
    }
}

impl TryFrom<AnonymousUser> for i64 {
    type Error = AppError;

    fn try_from(_: AnonymousUser) -> Result<Self, Self::Error> {
        Err(AppError::TypeMismatch(
            "Cannot cast AnonymousUser to int. Are you trying to use it in place of User?"
                .to_string(),
        ))
    }
}

/// The identity a request resolved to.
#[derive(Debug, Clone)]
pub enum RequestIdentity {
    User(User),
    Anonymous(AnonymousUser),
}

impl RequestIdentity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            Self::Anonymous(_) => None,
        }
    }

    pub fn id(&self) -> Option<i32> {
        self.user().map(|u| u.id)
    }

    pub fn is_active(&self) -> bool {
        self.user().is_some_and(|u| u.is_active)
    }

    pub fn is_staff(&self) -> bool {
        self.user().is_some_and(|u| u.is_staff)
    }

    pub fn is_superuser(&self) -> bool {
        self.user().is_some_and(|u| u.is_superuser)
    }
}

impl Default for RequestIdentity {
    fn default() -> Self {
        Self::Anonymous(AnonymousUser)
    }
}

impl From<User> for RequestIdentity {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}

impl Identity for RequestIdentity {
    fn get_username(&self) -> &str {
        match self {
            Self::User(u) => u.get_username(),
            Self::Anonymous(a) => a.get_username(),
        }
    }

    fn is_authenticated(&self) -> bool {
        match self {
            Self::User(u) => u.is_authenticated(),
            Self::Anonymous(a) => a.is_authenticated(),
        }
    }

    fn set_password(&mut self, raw_password: Option<&str>) -> AppResult<()> {
        match self {
            Self::User(u) => u.set_password(raw_password),
            Self::Anonymous(a) => a.set_password(raw_password),
        }
    }

    fn check_password(&self, raw_password: &str) -> AppResult<bool> {
        match self {
            Self::User(u) => u.check_password(raw_password),
            Self::Anonymous(a) => a.check_password(raw_password),
        }
    }
}
