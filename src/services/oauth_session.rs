//! OAuth session lifecycle: link, validate, refresh, revoke.
//!
//! ```text
//! Unlinked --link--> Linked --time--> Expired --refresh--> Refreshed
//!                      |                 |                     |
//!                      +-----revoke / rejected refresh--------> Revoked
//! ```
//!
//! A refresh is a compare-and-swap on the refresh token it used. When the
//! provider rotates refresh tokens only one concurrent refresh writes, and
//! the other returns the row the winner stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::identity::RequestIdentity;
use crate::models::oauth::{AppOAuthCredentials, OAuthUserSession, SessionState, TokenBundle};
use crate::services::oauth_credentials::OAuthCredentialStore;
use crate::services::oauth_provider::{OAuthProvider, ProviderError};

#[derive(Clone)]
pub struct OAuthSessionService {
    db: DatabaseConnection,
    credentials: OAuthCredentialStore,
    provider: Arc<dyn OAuthProvider>,
}

impl OAuthSessionService {
    pub fn new(
        db: DatabaseConnection,
        credentials: OAuthCredentialStore,
        provider: Arc<dyn OAuthProvider>,
    ) -> Self {
        Self {
            db,
            credentials,
            provider,
        }
    }

    pub async fn get(&self, user_id: i32) -> AppResult<Option<OAuthUserSession>> {
        db::oauth_sessions::find(&self.db, user_id).await
    }

    pub async fn state(&self, user_id: i32, now: DateTime<Utc>) -> AppResult<SessionState> {
        Ok(self
            .get(user_id)
            .await?
            .map(|s| s.state_at(now))
            .unwrap_or(SessionState::Unlinked))
    }

    /// Store a token bundle for a user, replacing any previous session.
    pub async fn link(
        &self,
        user_id: i32,
        authorization_code: &str,
        bundle: &TokenBundle,
    ) -> AppResult<OAuthUserSession> {
        db::users::get_by_id(&self.db, user_id).await?;
        let session =
            db::oauth_sessions::upsert(&self.db, user_id, authorization_code, bundle, Utc::now())
                .await?;
        info!(user_id, scopes = session.scopes.len(), "OAuth session linked");
        Ok(session)
    }

    /// Exchange an authorization code with the provider and link the result.
    pub async fn exchange_code(
        &self,
        user_id: i32,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<OAuthUserSession> {
        db::users::get_by_id(&self.db, user_id).await?;
        let credentials = self.app_credentials().await?;
        let code = SecretString::from(code.to_string());

        let bundle = self
            .provider
            .exchange_code(&credentials, &code, redirect_uri)
            .await
            .map_err(|e| {
                warn!(user_id, "OAuth: code exchange failed: {}", e);
                AppError::from(e)
            })?;

        self.link(user_id, code.expose_secret(), &bundle).await
    }

    /// Whether the user has a usable access token. Missing sessions are invalid.
    pub async fn is_valid(&self, user_id: i32) -> AppResult<bool> {
        Ok(self.get(user_id).await?.is_some_and(|s| s.is_valid()))
    }

    /// Obtain a fresh access token using the stored refresh token.
    ///
    /// A rejected grant revokes the session and returns `AuthRequired`;
    /// transport failures return `Upstream` and leave the session untouched.
    pub async fn refresh(&self, user_id: i32) -> AppResult<OAuthUserSession> {
        let session = self.get(user_id).await?.ok_or_else(|| {
            AppError::AuthRequired(format!("No OAuth session linked for user {}", user_id))
        })?;

        if session.is_revoked() {
            return Err(AppError::AuthRequired(
                "OAuth session has been revoked".to_string(),
            ));
        }
        if !session.has_refresh_token() {
            db::oauth_sessions::mark_revoked(&self.db, user_id, None, Utc::now()).await?;
            warn!(user_id, "OAuth: session has no refresh token, revoked");
            return Err(AppError::AuthRequired(
                "OAuth session has no refresh token".to_string(),
            ));
        }

        let credentials = self.app_credentials().await?;
        let old_refresh_token = session.refresh_token.expose_secret().to_string();

        match self
            .provider
            .refresh(&credentials, &session.refresh_token)
            .await
        {
            Ok(bundle) => {
                let won = db::oauth_sessions::apply_refresh(
                    &self.db,
                    user_id,
                    &old_refresh_token,
                    &bundle,
                    Utc::now(),
                )
                .await?;
                if won {
                    info!(user_id, "OAuth session refreshed");
                } else {
                    debug!(user_id, "OAuth: concurrent refresh already applied");
                }

                let current = self.get(user_id).await?.ok_or_else(|| {
                    AppError::AuthRequired(format!("OAuth session for user {} was unlinked", user_id))
                })?;
                if current.is_revoked() {
                    return Err(AppError::AuthRequired(
                        "OAuth session has been revoked".to_string(),
                    ));
                }
                Ok(current)
            }
            Err(ProviderError::Rejected(reason)) => {
                db::oauth_sessions::mark_revoked(
                    &self.db,
                    user_id,
                    Some(&old_refresh_token),
                    Utc::now(),
                )
                .await?;
                warn!(user_id, reason = %reason, "OAuth: refresh rejected, session revoked");
                Err(AppError::AuthRequired(format!(
                    "OAuth refresh rejected ({}); the user must authorize again",
                    reason
                )))
            }
            Err(err @ ProviderError::Transport(_)) => {
                warn!(user_id, "OAuth: refresh failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Clear the tokens and mark the session revoked.
    pub async fn revoke(&self, user_id: i32) -> AppResult<bool> {
        let revoked = db::oauth_sessions::mark_revoked(&self.db, user_id, None, Utc::now()).await?;
        if revoked {
            info!(user_id, "OAuth session revoked");
        }
        Ok(revoked)
    }

    /// Delete the session row entirely.
    pub async fn unlink(&self, user_id: i32) -> AppResult<bool> {
        let removed = db::oauth_sessions::delete(&self.db, user_id).await?;
        if removed {
            info!(user_id, "OAuth session unlinked");
        }
        Ok(removed)
    }

    /// Resolve a bearer access token to the identity it belongs to. Unknown,
    /// expired or revoked tokens and inactive users resolve to anonymous.
    pub async fn authenticate_bearer(&self, access_token: &str) -> AppResult<RequestIdentity> {
        let Some(session) =
            db::oauth_sessions::find_by_access_token(&self.db, access_token).await?
        else {
            return Ok(RequestIdentity::default());
        };
        if !session.is_valid() {
            return Ok(RequestIdentity::default());
        }
        Ok(db::users::find_by_id(&self.db, session.user_id)
            .await?
            .filter(|u| u.is_active)
            .map(RequestIdentity::User)
            .unwrap_or_default())
    }

    async fn app_credentials(&self) -> AppResult<AppOAuthCredentials> {
        self.credentials.get().await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::Configuration(format!(
                "OAuth credentials are not configured for application '{}'",
                self.credentials.application_id()
            )),
            other => other,
        })
    }
}
