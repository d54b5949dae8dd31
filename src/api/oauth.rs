//! OAuth credential and session administration endpoints.

use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AdminAuth;
use crate::error::{AppError, AppResult};
use crate::models::oauth::{
    CredentialsDefaults, CredentialsResponse, ExchangeCodeRequest, SessionStatusResponse,
};
use crate::services::{OAuthCredentialStore, OAuthSessionService};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_credentials)
        .service(create_credentials)
        .service(update_credentials)
        .service(session_status)
        .service(exchange_code)
        .service(refresh_session)
        .service(revoke_session);
}

#[derive(Debug, Deserialize)]
pub struct UpdateCredentialsRequest {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeQuery {
    /// Delete the row instead of marking it revoked
    #[serde(default)]
    pub unlink: bool,
}

/// GET /api/v1/oauth/credentials
#[get("/oauth/credentials")]
pub async fn get_credentials(
    _auth: AdminAuth,
    store: web::Data<OAuthCredentialStore>,
) -> AppResult<HttpResponse> {
    let credentials = store.get().await?;
    Ok(HttpResponse::Ok().json(CredentialsResponse::from(&credentials)))
}

/// Get or create. 201 when this call created the row, 200 otherwise.
///
/// POST /api/v1/oauth/credentials
#[post("/oauth/credentials")]
pub async fn create_credentials(
    _auth: AdminAuth,
    body: Option<web::Json<CredentialsDefaults>>,
    store: web::Data<OAuthCredentialStore>,
) -> AppResult<HttpResponse> {
    let defaults = body.map(|b| b.into_inner()).unwrap_or_default();
    let (credentials, created) = store.get_or_create(defaults).await?;
    let response = CredentialsResponse::from(&credentials);
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

/// PUT /api/v1/oauth/credentials
#[put("/oauth/credentials")]
pub async fn update_credentials(
    _auth: AdminAuth,
    body: web::Json<UpdateCredentialsRequest>,
    store: web::Data<OAuthCredentialStore>,
) -> AppResult<HttpResponse> {
    if body.client_id.trim().is_empty() {
        return Err(AppError::InvalidInput("client_id is required".to_string()));
    }
    let credentials = store.update(&body.client_id, &body.client_secret).await?;
    Ok(HttpResponse::Ok().json(CredentialsResponse::from(&credentials)))
}

/// GET /api/v1/oauth/sessions/{user_id}
#[get("/oauth/sessions/{user_id}")]
pub async fn session_status(
    _auth: AdminAuth,
    path: web::Path<i32>,
    sessions: web::Data<OAuthSessionService>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let response = match sessions.get(user_id).await? {
        Some(session) => SessionStatusResponse::from_session(&session, Utc::now()),
        None => SessionStatusResponse::unlinked(user_id),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// POST /api/v1/oauth/sessions/{user_id}/exchange
#[post("/oauth/sessions/{user_id}/exchange")]
pub async fn exchange_code(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<ExchangeCodeRequest>,
    sessions: web::Data<OAuthSessionService>,
) -> AppResult<HttpResponse> {
    let session = sessions
        .exchange_code(path.into_inner(), &body.code, &body.redirect_uri)
        .await?;
    Ok(HttpResponse::Ok().json(SessionStatusResponse::from_session(&session, Utc::now())))
}

/// POST /api/v1/oauth/sessions/{user_id}/refresh
#[post("/oauth/sessions/{user_id}/refresh")]
pub async fn refresh_session(
    _auth: AdminAuth,
    path: web::Path<i32>,
    sessions: web::Data<OAuthSessionService>,
) -> AppResult<HttpResponse> {
    let session = sessions.refresh(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SessionStatusResponse::from_session(&session, Utc::now())))
}

/// Revoke, or with `?unlink=true` delete, a user's session.
///
/// DELETE /api/v1/oauth/sessions/{user_id}
#[delete("/oauth/sessions/{user_id}")]
pub async fn revoke_session(
    _auth: AdminAuth,
    path: web::Path<i32>,
    query: web::Query<RevokeQuery>,
    sessions: web::Data<OAuthSessionService>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let found = if query.unlink {
        sessions.unlink(user_id).await?
    } else {
        sessions.revoke(user_id).await?
    };
    if !found {
        return Err(AppError::NotFound(format!(
            "OAuth session for user {}",
            user_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}
