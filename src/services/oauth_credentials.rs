//! Per-application OAuth client credentials.

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::oauth::{AppOAuthCredentials, CredentialsDefaults};

/// Credential store keyed by the deployed application identity.
#[derive(Clone)]
pub struct OAuthCredentialStore {
    db: DatabaseConnection,
    application_id: String,
}

impl OAuthCredentialStore {
    pub fn new(db: DatabaseConnection, application_id: impl Into<String>) -> Self {
        Self {
            db,
            application_id: application_id.into(),
        }
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Credentials for this application. `NotFound` when none are stored.
    pub async fn get(&self) -> AppResult<AppOAuthCredentials> {
        db::oauth_credentials::find(&self.db, &self.application_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "OAuth credentials for application '{}'",
                    self.application_id
                ))
            })
    }

    /// Credentials for this application, creating the row from `defaults`
    /// if absent. Concurrent first calls create exactly one row.
    pub async fn get_or_create(
        &self,
        defaults: CredentialsDefaults,
    ) -> AppResult<(AppOAuthCredentials, bool)> {
        let created = db::oauth_credentials::insert_if_absent(
            &self.db,
            &self.application_id,
            &defaults.client_id,
            &defaults.client_secret,
        )
        .await?;
        if created {
            info!(application_id = %self.application_id, "OAuth credentials created");
        }
        Ok((self.get().await?, created))
    }

    pub async fn update(&self, client_id: &str, client_secret: &str) -> AppResult<AppOAuthCredentials> {
        if !db::oauth_credentials::update(&self.db, &self.application_id, client_id, client_secret)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "OAuth credentials for application '{}'",
                self.application_id
            )));
        }
        info!(application_id = %self.application_id, "OAuth credentials updated");
        self.get().await
    }
}
