//! Business logic services.

pub mod backends;
pub mod mail;
pub mod oauth_credentials;
pub mod oauth_provider;
pub mod oauth_session;
pub mod password;
pub mod permissions;
pub mod user_manager;
pub mod validators;

use std::sync::Arc;

use actix_web::web;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::permission::PermissionRegistry;

pub use backends::{AuthBackend, BackendArg, BackendRegistry, Credentials};
pub use mail::{LogMailer, Mailer};
pub use oauth_credentials::OAuthCredentialStore;
pub use oauth_provider::{HttpOAuthProvider, OAuthProvider, ProviderError};
pub use oauth_session::OAuthSessionService;
pub use permissions::PermissionService;
pub use user_manager::{UserManager, WithPermOptions};

/// Everything the web layer and CLI need, wired from one configuration.
#[derive(Clone)]
pub struct AuthServices {
    pub registry: Arc<PermissionRegistry>,
    pub backends: Arc<BackendRegistry>,
    pub users: UserManager,
    pub permissions: PermissionService,
    pub credentials: OAuthCredentialStore,
    pub sessions: OAuthSessionService,
    pub mailer: Arc<dyn Mailer>,
}

impl AuthServices {
    /// Wire services with the HTTP token endpoint client from `config`.
    pub fn build(pool: &DbPool, config: &Config) -> AppResult<Self> {
        let provider = Arc::new(HttpOAuthProvider::new(config.oauth.token_uri.clone())?);
        Self::with_provider(pool, config, provider)
    }

    /// Wire services around an explicit token endpoint client.
    pub fn with_provider(
        pool: &DbPool,
        config: &Config,
        provider: Arc<dyn OAuthProvider>,
    ) -> AppResult<Self> {
        let db = pool.connection().clone();
        let registry = Arc::new(PermissionRegistry::from_models(&config.permission_models)?);
        let backends = Arc::new(BackendRegistry::from_names(
            &config.auth_backends,
            &db,
            registry.clone(),
        )?);
        let credentials = OAuthCredentialStore::new(db.clone(), config.application_id.clone());

        Ok(Self {
            users: UserManager::new(db.clone(), backends.clone()),
            permissions: PermissionService::new(db.clone(), registry.clone()),
            sessions: OAuthSessionService::new(db, credentials.clone(), provider),
            credentials,
            registry,
            backends,
            mailer: Arc::new(LogMailer::default()),
        })
    }

    /// Register each service as actix app data.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.users.clone()))
            .app_data(web::Data::new(self.permissions.clone()))
            .app_data(web::Data::new(self.credentials.clone()))
            .app_data(web::Data::new(self.sessions.clone()))
            .app_data(web::Data::from(self.backends.clone()))
            .app_data(web::Data::from(self.mailer.clone()));
    }
}
