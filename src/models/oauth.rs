//! OAuth models: application client credentials and per-user token sessions.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode_set;

/// OAuth client credentials for one application identity.
#[derive(Debug, Clone)]
pub struct AppOAuthCredentials {
    /// Application identity this row belongs to
    pub id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl From<crate::entity::app_oauth_credentials::Model> for AppOAuthCredentials {
    fn from(m: crate::entity::app_oauth_credentials::Model) -> Self {
        Self {
            id: m.id,
            client_id: m.client_id,
            client_secret: SecretString::from(m.client_secret),
        }
    }
}

/// Values used to seed a credentials row that does not exist yet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsDefaults {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

/// Credentials response. The secret itself is never returned.
#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub id: String,
    pub client_id: String,
    pub has_client_secret: bool,
}

impl From<&AppOAuthCredentials> for CredentialsResponse {
    fn from(c: &AppOAuthCredentials) -> Self {
        Self {
            id: c.id.clone(),
            client_id: c.client_id.clone(),
            has_client_secret: !c.client_secret.expose_secret().is_empty(),
        }
    }
}

/// Lifecycle state of a user's OAuth session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unlinked,
    Linked,
    Expired,
    Refreshed,
    Revoked,
}

/// Token endpoint response, parsed.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<i64>,
    /// `None` when the provider did not report scopes
    pub scopes: Option<BTreeSet<String>>,
    /// Full payload as returned by the provider
    pub raw: Value,
}

impl TokenBundle {
    /// Parse a token endpoint JSON body. Fails when `access_token` is missing.
    pub fn from_response(raw: Value) -> Result<Self, String> {
        let access_token = raw
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "token response has no access_token".to_string())?
            .to_string();

        let string_field = |name: &str| {
            raw.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        // Some providers send expires_in as a string.
        let expires_in = match raw.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        if let Some(secs) = expires_in
            && expiry_after(Utc::now(), secs).is_none()
        {
            return Err(format!("token response expires_in out of range: {}", secs));
        }

        let scopes = raw
            .get("scope")
            .and_then(Value::as_str)
            .map(decode_set);

        Ok(Self {
            refresh_token: string_field("refresh_token"),
            id_token: string_field("id_token"),
            token_type: string_field("token_type").unwrap_or_else(|| "Bearer".to_string()),
            access_token,
            expires_in,
            scopes,
            raw,
        })
    }

    /// Expiry instant relative to `now`. `None` when unknown or unrepresentable.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.and_then(|secs| expiry_after(now, secs))
    }
}

fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
}

/// OAuth tokens linked to a user.
#[derive(Debug, Clone)]
pub struct OAuthUserSession {
    pub user_id: i32,
    pub authorization_code: SecretString,
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub id_token: SecretString,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in: Option<i64>,
    pub scopes: BTreeSet<String>,
    pub token: Value,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthUserSession {
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// True when the access token is present, not revoked and not yet expired.
    /// A session without an expiry is never valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() || self.access_token.expose_secret().is_empty() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && !self.is_valid_at(now)
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.expose_secret().is_empty()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_revoked() {
            SessionState::Revoked
        } else if !self.is_valid_at(now) {
            SessionState::Expired
        } else if self.refreshed_at.is_some() {
            SessionState::Refreshed
        } else {
            SessionState::Linked
        }
    }
}

impl From<crate::entity::oauth_user_session::Model> for OAuthUserSession {
    fn from(m: crate::entity::oauth_user_session::Model) -> Self {
        Self {
            user_id: m.user_id,
            authorization_code: SecretString::from(m.authorization_code),
            access_token: SecretString::from(m.access_token),
            refresh_token: SecretString::from(m.refresh_token),
            id_token: SecretString::from(m.id_token),
            token_type: m.token_type,
            expires_at: m.expires_at,
            expires_in: m.expires_in,
            scopes: decode_set(&m.scopes),
            token: m.token,
            refreshed_at: m.refreshed_at,
            revoked_at: m.revoked_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Session status response. Tokens are never echoed back.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub user_id: i32,
    pub state: SessionState,
    pub is_valid: bool,
    pub token_type: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<String>,
    pub refreshed_at: Option<String>,
    pub revoked_at: Option<String>,
}

impl SessionStatusResponse {
    pub fn unlinked(user_id: i32) -> Self {
        Self {
            user_id,
            state: SessionState::Unlinked,
            is_valid: false,
            token_type: None,
            scopes: Vec::new(),
            expires_at: None,
            refreshed_at: None,
            revoked_at: None,
        }
    }

    pub fn from_session(session: &OAuthUserSession, now: DateTime<Utc>) -> Self {
        Self {
            user_id: session.user_id,
            state: session.state_at(now),
            is_valid: session.is_valid_at(now),
            token_type: Some(session.token_type.clone()),
            scopes: session.scopes.iter().cloned().collect(),
            expires_at: session.expires_at.map(|d| d.to_rfc3339()),
            refreshed_at: session.refreshed_at.map(|d| d.to_rfc3339()),
            revoked_at: session.revoked_at.map(|d| d.to_rfc3339()),
        }
    }
}

/// Request to exchange an authorization code for tokens.
#[derive(Debug, Deserialize)]
pub struct ExchangeCodeRequest {
    pub code: String,
    pub redirect_uri: String,
}
