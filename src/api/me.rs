//! Current-identity endpoint.

use actix_web::{HttpResponse, get, web};
use serde::Serialize;

use crate::auth::CurrentIdentity;
use crate::error::AppResult;
use crate::models::identity::{Identity, RequestIdentity};
use crate::models::user::UserResponse;
use crate::services::BackendRegistry;

#[derive(Serialize)]
pub struct MeResponse {
    is_authenticated: bool,
    is_anonymous: bool,
    username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
    permissions: Vec<String>,
}

/// Describe the caller: the bearer token's user, or the anonymous identity.
///
/// GET /api/v1/auth/me
#[get("/auth/me")]
pub async fn me(
    CurrentIdentity(identity): CurrentIdentity,
    backends: web::Data<BackendRegistry>,
) -> AppResult<HttpResponse> {
    let permissions = backends
        .get_all_permissions(&identity, None)
        .await?
        .into_iter()
        .collect();

    let response = MeResponse {
        is_authenticated: identity.is_authenticated(),
        is_anonymous: identity.is_anonymous(),
        username: identity.get_username().to_string(),
        user: match identity {
            RequestIdentity::User(user) => Some(user.into()),
            RequestIdentity::Anonymous(_) => None,
        },
        permissions,
    };
    Ok(HttpResponse::Ok().json(response))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(me);
}
