//! Group administration endpoints.

use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;

use crate::auth::AdminAuth;
use crate::error::{AppError, AppResult};
use crate::models::group::{AddMemberRequest, CreateGroupRequest};
use crate::services::PermissionService;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_group)
        .service(list_groups)
        .service(set_group_permissions)
        .service(add_member)
        .service(remove_member);
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permissions: Vec<String>,
}

/// POST /api/v1/groups
#[post("/groups")]
pub async fn create_group(
    _auth: AdminAuth,
    body: web::Json<CreateGroupRequest>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let group = permissions
        .create_group(&body.name, &body.permissions)
        .await?;
    Ok(HttpResponse::Created().json(group))
}

/// GET /api/v1/groups
#[get("/groups")]
pub async fn list_groups(
    _auth: AdminAuth,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(permissions.list_groups().await?))
}

/// PUT /api/v1/groups/{id}/permissions
#[put("/groups/{id}/permissions")]
pub async fn set_group_permissions(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<SetPermissionsRequest>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let group = permissions
        .set_group_permissions(path.into_inner(), &body.permissions)
        .await?;
    Ok(HttpResponse::Ok().json(group))
}

/// POST /api/v1/groups/{id}/members
#[post("/groups/{id}/members")]
pub async fn add_member(
    _auth: AdminAuth,
    path: web::Path<i32>,
    body: web::Json<AddMemberRequest>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    permissions.add_member(path.into_inner(), body.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /api/v1/groups/{id}/members/{user_id}
#[delete("/groups/{id}/members/{user_id}")]
pub async fn remove_member(
    _auth: AdminAuth,
    path: web::Path<(i32, i32)>,
    permissions: web::Data<PermissionService>,
) -> AppResult<HttpResponse> {
    let (group_id, user_id) = path.into_inner();
    if !permissions.remove_member(group_id, user_id).await? {
        return Err(AppError::NotFound(format!(
            "Membership of user {} in group {}",
            user_id, group_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}
