//! User administration endpoints.

use actix_web::{HttpResponse, delete, get, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AdminAuth;
use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::permission::{PermissionGrantRequest, UserPermission};
use crate::models::user::{CreateUserRequest, UserResponse};
use crate::services::{BackendArg, Mailer, PermissionService, UserManager, WithPermOptions};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_user)
        .service(create_superuser)
        .service(with_perm)
        .service(list_users)
        .service(get_user)
        .service(deactivate_user)
        .service(set_password)
        .service(email_user)
        .service(list_permissions)
        .service(grant_permission)
        .service(revoke_permission);
}

fn default_true() -> Option<bool> {
    Some(true)
}

fn default_include_superusers() -> bool {
    true
}

/// Body of a permission-holder lookup. `is_active: null` disables the filter.
#[derive(Debug, Deserialize)]
pub struct WithPermRequest {
    pub perm: String,
    #[serde(default = "default_true")]
    pub is_active: Option<bool>,
    #[serde(default = "default_include_superusers")]
    pub include_superusers: bool,
    #[serde(default)]
    pub backend: Option<BackendArg>,
    #[serde(default)]
    pub obj: Option<i64>,
}

/// New password; omitted or `null` makes the password unusable.
#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailUserRequest {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub from_email: Option<String>,
}

#[derive(Serialize)]
pub struct PermissionListResponse {
    user_id: i32,
    permissions: Vec<UserPermission>,
}

/// POST /api/v1/users
#[post("/users")]
pub async fn create_user(
    auth: AdminAuth,
    body: web::Json<CreateUserRequest>,
    users: web::Data<UserManager>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let user = users
        .create_user(
            &body.username,
            body.email.as_deref(),
            body.password.as_deref(),
            body.extra,
        )
        .await?;
    info!(caller = ?auth.caller, user_id = user.id, "User created via API");
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /api/v1/users/superuser
#[post("/users/superuser")]
pub async fn create_superuser(
    auth: AdminAuth,
    body: web::Json<CreateUserRequest>,
    users: web::Data<UserManager>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let user = users
        .create_superuser(
            &body.username,
            body.email.as_deref(),
            body.password.as_deref(),
            body.extra,
        )
        .await?;
    info!(caller = ?auth.caller, user_id = user.id, "Superuser created via API");
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// Users holding a permission.
///
/// POST /api/v1/users/with-perm
#[post("/users/with-perm")]
pub async fn with_perm(
    _auth: AdminAuth,
    body: web::Json<WithPermRequest>,
    users: web::Data<UserManager>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let found = users
        .with_perm(
            &body.perm,
            WithPermOptions {
                is_active: body.is_active,
                include_superusers: body.include_superusers,
                backend: body.backend,
                obj: body.obj,
            },
        )
        .await?;
    let response: Vec<UserResponse> = found.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/users
#[get("/users")]
pub async fn list_users(_auth: AdminAuth, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let users = db::users::list(pool.connection()).await?;
    let response: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// GET /api/v1/users/{id}
#[get("/users/{id}")]
pub async fn get_user(
    _auth: AdminAuth,
    path: web::Path<i32>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let user = db::users::get_by_id(pool.connection(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /api/v1/users/{id}/deactivate
#[post("/users/{id}/deactivate")]
pub async fn deactivate_user(
    auth: AdminAuth,
    path: web::Path<i32>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let user = db::users::set_active(pool.connection(), path.into_inner(), false).await?;
    info!(caller = ?auth.caller, user_id = user.id, "User deactivated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /api/v1/users/{id}/password
#[post("/users/{id}/password")]
pub async fn set_password(
    auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<SetPasswordRequest>,
    users: web::Data<UserManager>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    users
        .set_password(user_id, body.password.as_deref())
        .await?;
    info!(caller = ?auth.caller, user_id, "Password set via API");
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/users/{id}/email
#[post("/users/{id}/email")]
pub async fn email_user(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<EmailUserRequest>,
    pool: web::Data<DbPool>,
    mailer: web::Data<dyn Mailer>,
) -> AppResult<HttpResponse> {
    let user = db::users::get_by_id(pool.connection(), path.into_inner()).await?;
    if user.email.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "User {} has no email address",
            user.id
        )));
    }
    user.email_user(
        mailer.get_ref(),
        &body.subject,
        &body.message,
        body.from_email.as_deref(),
    )
    .await?;
    Ok(HttpResponse::Accepted().finish())
}

/// GET /api/v1/users/{id}/permissions
#[get("/users/{id}/permissions")]
pub async fn list_permissions(
    _auth: AdminAuth,
    path: web::Path<i32>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let granted = permissions.user_permissions(user_id).await?;
    Ok(HttpResponse::Ok().json(PermissionListResponse {
        user_id,
        permissions: granted,
    }))
}

/// POST /api/v1/users/{id}/permissions
#[post("/users/{id}/permissions")]
pub async fn grant_permission(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<PermissionGrantRequest>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let grant = permissions
        .grant_permission(path.into_inner(), &body.permission, body.obj_id)
        .await?;
    Ok(HttpResponse::Created().json(grant))
}

/// DELETE /api/v1/users/{id}/permissions
#[delete("/users/{id}/permissions")]
pub async fn revoke_permission(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<PermissionGrantRequest>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    if !permissions
        .revoke_permission(user_id, &body.permission, body.obj_id)
        .await?
    {
        return Err(AppError::NotFound(format!(
            "Permission '{}' for user {}",
            body.permission, user_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}
