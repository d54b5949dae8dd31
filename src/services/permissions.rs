//! Permission grants and group management.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::group::Group;
use crate::models::permission::{PermissionRegistry, UserPermission, check_obj_id};

const GROUP_NAME_MAX_LENGTH: usize = 150;

/// Grants permissions to users and manages groups, validating every
/// permission code against the registry.
#[derive(Clone)]
pub struct PermissionService {
    db: DatabaseConnection,
    registry: Arc<PermissionRegistry>,
}

impl PermissionService {
    pub fn new(db: DatabaseConnection, registry: Arc<PermissionRegistry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Grant `perm` to a user, globally or on one object.
    pub async fn grant_permission(
        &self,
        user_id: i32,
        perm: &str,
        obj: Option<i64>,
    ) -> AppResult<UserPermission> {
        let perm = self.registry.parse(perm)?;
        let obj_id = check_obj_id(obj)?;
        db::users::get_by_id(&self.db, user_id).await?;

        let grant = db::permissions::grant(&self.db, user_id, perm.as_str(), obj_id).await?;
        info!(user_id, permission = %perm, obj_id, "Permission granted");
        Ok(grant)
    }

    /// Remove a grant. Returns whether one existed.
    pub async fn revoke_permission(
        &self,
        user_id: i32,
        perm: &str,
        obj: Option<i64>,
    ) -> AppResult<bool> {
        let perm = self.registry.parse(perm)?;
        let obj_id = check_obj_id(obj)?;
        let removed = db::permissions::revoke(&self.db, user_id, perm.as_str(), obj_id).await?;
        if removed {
            info!(user_id, permission = %perm, obj_id, "Permission revoked");
        }
        Ok(removed)
    }

    pub async fn user_permissions(&self, user_id: i32) -> AppResult<Vec<UserPermission>> {
        db::permissions::list_for_user(&self.db, user_id).await
    }

    pub async fn create_group(&self, name: &str, perms: &[String]) -> AppResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Group name must be set".to_string()));
        }
        if name.chars().count() > GROUP_NAME_MAX_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "Ensure group name has at most {} characters",
                GROUP_NAME_MAX_LENGTH
            )));
        }
        let perms = self.registry.parse_set(perms)?;
        let group = db::groups::insert(&self.db, name, &perms).await?;
        info!(group_id = group.id, name = %group.name, "Group created");
        Ok(group)
    }

    pub async fn set_group_permissions(&self, group_id: i32, perms: &[String]) -> AppResult<Group> {
        let perms = self.registry.parse_set(perms)?;
        if !db::groups::set_permissions(&self.db, group_id, &perms).await? {
            return Err(AppError::NotFound(format!("Group {}", group_id)));
        }
        self.get_group(group_id).await
    }

    pub async fn get_group(&self, group_id: i32) -> AppResult<Group> {
        db::groups::find_by_id(&self.db, group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))
    }

    pub async fn list_groups(&self) -> AppResult<Vec<Group>> {
        db::groups::list(&self.db).await
    }

    pub async fn add_member(&self, group_id: i32, user_id: i32) -> AppResult<()> {
        self.get_group(group_id).await?;
        db::users::get_by_id(&self.db, user_id).await?;
        db::groups::add_member(&self.db, group_id, user_id).await?;
        info!(group_id, user_id, "Group member added");
        Ok(())
    }

    pub async fn remove_member(&self, group_id: i32, user_id: i32) -> AppResult<bool> {
        db::groups::remove_member(&self.db, group_id, user_id).await
    }

    pub async fn groups_for_user(&self, user_id: i32) -> AppResult<Vec<Group>> {
        db::groups::groups_for_user(&self.db, user_id).await
    }
}
