//! Actix-web extractors resolving the caller of a request.
//!
//! Header secrets are wrapped in `SecretString` as soon as they are read
//! and are never logged.

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, web};
use futures_util::future::LocalBoxFuture;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::AdminKey;
use crate::config::ADMIN_KEY_HEADER;
use crate::error::{AppError, ErrorResponse};
use crate::models::identity::RequestIdentity;
use crate::services::OAuthSessionService;

/// Extract a secret header value. `None` if missing or not valid UTF-8.
fn extract_secret_header(req: &HttpRequest, header_name: &str) -> Option<SecretString> {
    req.headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(|s| SecretString::from(s.to_string()))
}

/// Token from an `Authorization: Bearer <token>` header.
fn extract_bearer_token(req: &HttpRequest) -> Option<SecretString> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then(|| token.trim())
                .filter(|t| !t.is_empty())
        })
        .map(|t| SecretString::from(t.to_string()))
}

/// Authentication error for extractors.
#[derive(Debug)]
pub enum AuthError {
    Unauthorized(String),
    Internal(AppError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(msg) => write!(f, "{}", msg),
            Self::Internal(err) => write!(f, "{}", err),
        }
    }
}

impl ResponseError for AuthError {
    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Unauthorized(msg) => {
                HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
                    error: "UNAUTHORIZED".to_string(),
                    message: msg.clone(),
                })
            }
            Self::Internal(err) => err.error_response(),
        }
    }
}

async fn resolve_identity(
    sessions: Option<web::Data<OAuthSessionService>>,
    token: Option<SecretString>,
) -> Result<RequestIdentity, AuthError> {
    let Some(token) = token else {
        return Ok(RequestIdentity::default());
    };
    let sessions = sessions.ok_or_else(|| {
        AuthError::Internal(AppError::Configuration(
            "OAuth session service is not registered".to_string(),
        ))
    })?;
    sessions
        .authenticate_bearer(token.expose_secret())
        .await
        .map_err(AuthError::Internal)
}

/// The identity behind a request: the user owning a valid bearer access
/// token, otherwise anonymous. Never rejects a request on its own.
pub struct CurrentIdentity(pub RequestIdentity);

impl FromRequest for CurrentIdentity {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let sessions = req.app_data::<web::Data<OAuthSessionService>>().cloned();
        let token = extract_bearer_token(req);

        Box::pin(async move { resolve_identity(sessions, token).await.map(CurrentIdentity) })
    }
}

/// Who passed the admin gate.
#[derive(Debug, Clone)]
pub enum AdminCaller {
    /// Bootstrap `X-Admin-Key` holder
    BootstrapKey,
    /// Active staff user authenticated by bearer token
    Staff { user_id: i32, username: String },
}

/// Extractor for admin routes: a valid `X-Admin-Key`, or a bearer token
/// belonging to an active staff user.
pub struct AdminAuth {
    pub caller: AdminCaller,
}

impl FromRequest for AdminAuth {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let stored_admin_key = req.app_data::<web::Data<AdminKey>>().cloned();
        let provided_admin_key = extract_secret_header(req, ADMIN_KEY_HEADER);
        let sessions = req.app_data::<web::Data<OAuthSessionService>>().cloned();
        let token = extract_bearer_token(req);

        Box::pin(async move {
            if let (Some(provided), Some(stored)) = (&provided_admin_key, &stored_admin_key)
                && stored.verify(provided.expose_secret())
            {
                return Ok(AdminAuth {
                    caller: AdminCaller::BootstrapKey,
                });
            }

            if token.is_none() {
                return Err(AuthError::Unauthorized(format!(
                    "Missing credentials. Provide {} or an Authorization bearer token.",
                    ADMIN_KEY_HEADER
                )));
            }

            match resolve_identity(sessions, token).await? {
                RequestIdentity::User(user) if user.is_active && user.is_staff => Ok(AdminAuth {
                    caller: AdminCaller::Staff {
                        user_id: user.id,
                        username: user.username,
                    },
                }),
                RequestIdentity::User(user) => {
                    debug!(user_id = user.id, "Admin route refused for non-staff user");
                    Err(AuthError::Unauthorized(
                        "Staff privileges required".to_string(),
                    ))
                }
                RequestIdentity::Anonymous(_) => Err(AuthError::Unauthorized(
                    "Invalid or expired access token".to_string(),
                )),
            }
        })
    }
}
