//! Authentication backends and the ordered registry that dispatches to them.
//!
//! Backends are resolved by name from configuration (`model`, `oauth`).
//! Permission capabilities are optional: a backend that cannot answer
//! `with_perm` returns `None` and the caller treats it as "no users".

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::identity::RequestIdentity;
use crate::models::permission::PermissionRegistry;
use crate::models::user::User;
use crate::services::password;
use crate::services::validators::normalize_username;

pub const MODEL_BACKEND: &str = "model";
pub const OAUTH_BACKEND: &str = "oauth";

/// What a caller presents to authenticate.
#[derive(Debug, Clone)]
pub enum Credentials {
    Password { username: String, password: String },
    BearerToken(String),
}

/// Parameters of a "which users hold this permission" lookup.
#[derive(Debug, Clone)]
pub struct PermQuery {
    pub perm: String,
    pub is_active: Option<bool>,
    pub include_superusers: bool,
    pub obj: Option<i64>,
}

/// Backend selector as it arrives from callers. Only strings name a backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BackendArg {
    Name(String),
    Other(Value),
}

impl From<&str> for BackendArg {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Option<User>>;

    /// Users holding `query.perm`. `None` means the backend cannot answer.
    async fn with_perm(&self, _query: &PermQuery) -> AppResult<Option<Vec<User>>> {
        Ok(None)
    }

    async fn get_all_permissions(
        &self,
        _user: &User,
        _obj: Option<i64>,
    ) -> AppResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn has_perm(&self, user: &User, perm: &str, obj: Option<i64>) -> AppResult<bool> {
        Ok(user.is_active && self.get_all_permissions(user, obj).await?.contains(perm))
    }

    async fn has_module_perms(&self, user: &User, app_label: &str) -> AppResult<bool> {
        if !user.is_active {
            return Ok(false);
        }
        let prefix = format!("{}.", app_label);
        Ok(self
            .get_all_permissions(user, None)
            .await?
            .iter()
            .any(|p| p.starts_with(&prefix)))
    }
}

/// Username/password authentication with permissions from direct grants and groups.
pub struct ModelBackend {
    db: DatabaseConnection,
    registry: Arc<PermissionRegistry>,
}

impl ModelBackend {
    pub fn new(db: DatabaseConnection, registry: Arc<PermissionRegistry>) -> Self {
        Self { db, registry }
    }

    pub async fn get_user_permissions(
        &self,
        user: &User,
        obj: Option<i64>,
    ) -> AppResult<BTreeSet<String>> {
        if !user.is_active {
            return Ok(BTreeSet::new());
        }
        if user.is_superuser {
            return Ok(self.registry.choices().map(str::to_string).collect());
        }
        Ok(db::permissions::codes_for_user(&self.db, user.id, obj)
            .await?
            .into_iter()
            .collect())
    }

    pub async fn get_group_permissions(&self, user: &User) -> AppResult<BTreeSet<String>> {
        if !user.is_active {
            return Ok(BTreeSet::new());
        }
        if user.is_superuser {
            return Ok(self.registry.choices().map(str::to_string).collect());
        }
        Ok(db::groups::groups_for_user(&self.db, user.id)
            .await?
            .into_iter()
            .flat_map(|g| g.permissions)
            .collect())
    }
}

#[async_trait]
impl AuthBackend for ModelBackend {
    fn name(&self) -> &'static str {
        MODEL_BACKEND
    }

    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Option<User>> {
        let Credentials::Password { username, password: raw } = credentials else {
            return Ok(None);
        };

        let username = normalize_username(username);
        let Some(user) = db::users::find_by_username(&self.db, &username).await? else {
            // Hash anyway so unknown usernames cost the same as wrong passwords.
            password::make_password_async(Some(raw.clone())).await?;
            return Ok(None);
        };

        let ok = password::verify_password_async(raw.clone(), user.password.clone()).await;
        if !ok || !user.is_active {
            debug!(user_id = user.id, "Password authentication rejected");
            return Ok(None);
        }

        db::users::touch_last_login(&self.db, user.id).await?;
        Ok(Some(User {
            last_login: Some(Utc::now()),
            ..user
        }))
    }

    async fn with_perm(&self, query: &PermQuery) -> AppResult<Option<Vec<User>>> {
        let perm = self.registry.parse(&query.perm)?;

        let mut ids = db::permissions::user_ids_with(&self.db, perm.as_str(), query.obj).await?;
        ids.extend(db::groups::member_ids_with_permission(&self.db, perm.as_str()).await?);
        ids.sort_unstable();
        ids.dedup();

        let users =
            db::users::find_with_perm(&self.db, &ids, query.include_superusers, query.is_active)
                .await?;
        Ok(Some(users))
    }

    async fn get_all_permissions(
        &self,
        user: &User,
        obj: Option<i64>,
    ) -> AppResult<BTreeSet<String>> {
        let mut perms = self.get_user_permissions(user, obj).await?;
        perms.extend(self.get_group_permissions(user).await?);
        Ok(perms)
    }

    async fn has_perm(&self, user: &User, perm: &str, obj: Option<i64>) -> AppResult<bool> {
        if !user.is_active {
            return Ok(false);
        }
        if user.is_superuser {
            return Ok(true);
        }
        Ok(self.get_all_permissions(user, obj).await?.contains(perm))
    }

    async fn has_module_perms(&self, user: &User, app_label: &str) -> AppResult<bool> {
        if user.is_active && user.is_superuser {
            return Ok(true);
        }
        let prefix = format!("{}.", app_label);
        Ok(user.is_active
            && self
                .get_all_permissions(user, None)
                .await?
                .iter()
                .any(|p| p.starts_with(&prefix)))
    }
}

/// Authenticates bearer access tokens against linked OAuth sessions.
/// Has no permission lookup.
pub struct OAuthBackend {
    db: DatabaseConnection,
}

impl OAuthBackend {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuthBackend for OAuthBackend {
    fn name(&self) -> &'static str {
        OAUTH_BACKEND
    }

    async fn authenticate(&self, credentials: &Credentials) -> AppResult<Option<User>> {
        let Credentials::BearerToken(token) = credentials else {
            return Ok(None);
        };

        let Some(session) = db::oauth_sessions::find_by_access_token(&self.db, token).await? else {
            return Ok(None);
        };
        if !session.is_valid() {
            debug!(user_id = session.user_id, "Bearer token belongs to an invalid session");
            return Ok(None);
        }

        let user = db::users::find_by_id(&self.db, session.user_id).await?;
        Ok(user.filter(|u| u.is_active))
    }
}

/// Ordered list of configured backends.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn AuthBackend>>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Arc<dyn AuthBackend>>) -> Self {
        Self { backends }
    }

    /// Build backends by name, in order. Unknown names are a configuration error.
    pub fn from_names<S: AsRef<str>>(
        names: &[S],
        db: &DatabaseConnection,
        registry: Arc<PermissionRegistry>,
    ) -> AppResult<Self> {
        let mut backends: Vec<Arc<dyn AuthBackend>> = Vec::with_capacity(names.len());
        for name in names {
            let backend: Arc<dyn AuthBackend> = match name.as_ref() {
                MODEL_BACKEND => Arc::new(ModelBackend::new(db.clone(), registry.clone())),
                OAUTH_BACKEND => Arc::new(OAuthBackend::new(db.clone())),
                other => {
                    return Err(AppError::Configuration(format!(
                        "Unknown authentication backend '{}'",
                        other
                    )));
                }
            };
            backends.push(backend);
        }
        let loaded: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        info!(backends = ?loaded, "Authentication backends loaded");
        Ok(Self { backends })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Look up a configured backend by name.
    pub fn get(&self, name: &str) -> AppResult<Arc<dyn AuthBackend>> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .cloned()
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "Authentication backend '{}' is not configured",
                    name
                ))
            })
    }

    /// Pick the backend for a dispatching call. Without an explicit
    /// selector exactly one backend must be configured.
    pub fn select(&self, backend: Option<&BackendArg>) -> AppResult<Arc<dyn AuthBackend>> {
        match backend {
            Some(BackendArg::Name(name)) => self.get(name),
            Some(BackendArg::Other(value)) => Err(AppError::TypeMismatch(format!(
                "backend must be a string naming an authentication backend (got {})",
                value
            ))),
            None => match self.backends.as_slice() {
                [only] => Ok(only.clone()),
                [] => Err(AppError::Configuration(
                    "No authentication backends are configured.".to_string(),
                )),
                _ => Err(AppError::Configuration(
                    "You have multiple authentication backends configured and therefore must provide the `backend` argument."
                        .to_string(),
                )),
            },
        }
    }

    /// Try each backend in order; the first to accept wins.
    pub async fn authenticate(&self, credentials: &Credentials) -> AppResult<Option<User>> {
        for backend in &self.backends {
            if let Some(user) = backend.authenticate(credentials).await? {
                debug!(backend = backend.name(), user_id = user.id, "Authenticated");
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    pub async fn get_all_permissions(
        &self,
        identity: &RequestIdentity,
        obj: Option<i64>,
    ) -> AppResult<BTreeSet<String>> {
        let RequestIdentity::User(user) = identity else {
            return Ok(BTreeSet::new());
        };
        let mut perms = BTreeSet::new();
        for backend in &self.backends {
            perms.extend(backend.get_all_permissions(user, obj).await?);
        }
        Ok(perms)
    }

    pub async fn has_perm(
        &self,
        identity: &RequestIdentity,
        perm: &str,
        obj: Option<i64>,
    ) -> AppResult<bool> {
        let RequestIdentity::User(user) = identity else {
            return Ok(false);
        };
        if !user.is_active {
            return Ok(false);
        }
        for backend in &self.backends {
            if backend.has_perm(user, perm, obj).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All of `perms`. Anonymous identities hold none, even for an empty list.
    pub async fn has_perms(
        &self,
        identity: &RequestIdentity,
        perms: &[&str],
        obj: Option<i64>,
    ) -> AppResult<bool> {
        if identity.user().is_none() {
            return Ok(false);
        }
        for perm in perms {
            if !self.has_perm(identity, perm, obj).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn has_module_perms(
        &self,
        identity: &RequestIdentity,
        app_label: &str,
    ) -> AppResult<bool> {
        let RequestIdentity::User(user) = identity else {
            return Ok(false);
        };
        if !user.is_active {
            return Ok(false);
        }
        for backend in &self.backends {
            if backend.has_module_perms(user, app_label).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
