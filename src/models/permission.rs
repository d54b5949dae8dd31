//! Permission codes and the closed registry they are drawn from.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Actions every registered model gets a permission for.
pub const DEFAULT_ACTIONS: [&str; 4] = ["add", "change", "delete", "view"];

/// Object id meaning "not scoped to a single object".
pub const GLOBAL_OBJ_ID: i64 = 0;

/// A permission code of the form `app_label.codename`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn app_label(&self) -> &str {
        self.0.split_once('.').map(|(app, _)| app).unwrap_or("")
    }

    pub fn codename(&self) -> &str {
        self.0.split_once('.').map(|(_, code)| code).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of valid permission codes, derived from `app.model` labels.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    codes: BTreeSet<String>,
}

impl PermissionRegistry {
    /// Build the registry from model labels such as `blog.post`.
    pub fn from_models<S: AsRef<str>>(models: &[S]) -> AppResult<Self> {
        let mut codes = BTreeSet::new();
        for label in models {
            let label = label.as_ref().trim();
            let (app, model) = label
                .split_once('.')
                .filter(|(app, model)| is_identifier(app) && is_identifier(model))
                .ok_or_else(|| {
                    AppError::Configuration(format!(
                        "Invalid model label '{}': expected 'app_label.model'",
                        label
                    ))
                })?;
            let model = model.to_lowercase();
            for action in DEFAULT_ACTIONS {
                codes.insert(format!("{}.{}_{}", app, action, model));
            }
        }
        Ok(Self { codes })
    }

    /// Validate a permission code against the registry.
    pub fn parse(&self, code: &str) -> AppResult<Permission> {
        if self.codes.contains(code) {
            Ok(Permission(code.to_string()))
        } else {
            Err(AppError::InvalidInput(format!(
                "'{}' is not a valid permission",
                code
            )))
        }
    }

    /// Validate every code in `codes`, collecting them into a set.
    pub fn parse_set<S: AsRef<str>>(&self, codes: &[S]) -> AppResult<BTreeSet<String>> {
        codes
            .iter()
            .map(|c| self.parse(c.as_ref()).map(|p| p.0))
            .collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// All valid codes, sorted.
    pub fn choices(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A permission granted directly to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPermission {
    pub id: i32,
    pub user_id: i32,
    pub permission: String,
    /// `0` grants the permission on every object
    pub obj_id: i64,
}

impl From<crate::entity::user_permission::Model> for UserPermission {
    fn from(m: crate::entity::user_permission::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            permission: m.permission,
            obj_id: m.obj_id,
        }
    }
}

/// Request to grant or revoke a permission.
#[derive(Debug, Deserialize)]
pub struct PermissionGrantRequest {
    pub permission: String,
    #[serde(default)]
    pub obj_id: Option<i64>,
}

/// Reject negative object ids; `None` maps to the global grant.
pub fn check_obj_id(obj: Option<i64>) -> AppResult<i64> {
    match obj {
        None => Ok(GLOBAL_OBJ_ID),
        Some(id) if id < 0 => Err(AppError::InvalidInput(format!(
            "obj_id must be non-negative (got {})",
            id
        ))),
        Some(id) => Ok(id),
    }
}
