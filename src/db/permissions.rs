//! Database operations for direct user permission grants.

use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use crate::entity::user_permission;
use crate::error::{AppError, AppResult};
use crate::models::permission::{GLOBAL_OBJ_ID, UserPermission};

/// Grant `permission` to a user. Granting twice is a no-op.
pub async fn grant(
    db: &DatabaseConnection,
    user_id: i32,
    permission: &str,
    obj_id: i64,
) -> AppResult<UserPermission> {
    let model = user_permission::ActiveModel {
        user_id: Set(user_id),
        permission: Set(permission.to_string()),
        obj_id: Set(obj_id),
        ..Default::default()
    };

    let result = user_permission::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                user_permission::Column::UserId,
                user_permission::Column::Permission,
                user_permission::Column::ObjId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e.into()),
    }

    find(db, user_id, permission, obj_id)
        .await?
        .ok_or_else(|| AppError::Database("Failed to fetch permission grant".to_string()))
}

async fn find(
    db: &DatabaseConnection,
    user_id: i32,
    permission: &str,
    obj_id: i64,
) -> AppResult<Option<UserPermission>> {
    let result = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::Permission.eq(permission))
        .filter(user_permission::Column::ObjId.eq(obj_id))
        .one(db)
        .await?;
    Ok(result.map(UserPermission::from))
}

/// Remove a grant. Returns whether a row was deleted.
pub async fn revoke(
    db: &DatabaseConnection,
    user_id: i32,
    permission: &str,
    obj_id: i64,
) -> AppResult<bool> {
    let result = user_permission::Entity::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::Permission.eq(permission))
        .filter(user_permission::Column::ObjId.eq(obj_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// All grants held by a user.
pub async fn list_for_user(db: &DatabaseConnection, user_id: i32) -> AppResult<Vec<UserPermission>> {
    let results = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .order_by_asc(user_permission::Column::Id)
        .all(db)
        .await?;
    Ok(results.into_iter().map(UserPermission::from).collect())
}

/// Condition matching grants that apply to `obj`: global grants always,
/// object grants only for that object.
fn obj_condition(obj: Option<i64>) -> Condition {
    match obj {
        Some(id) if id != GLOBAL_OBJ_ID => Condition::any()
            .add(user_permission::Column::ObjId.eq(GLOBAL_OBJ_ID))
            .add(user_permission::Column::ObjId.eq(id)),
        _ => Condition::all().add(user_permission::Column::ObjId.eq(GLOBAL_OBJ_ID)),
    }
}

/// Permission codes a user holds directly for `obj`.
pub async fn codes_for_user(
    db: &DatabaseConnection,
    user_id: i32,
    obj: Option<i64>,
) -> AppResult<Vec<String>> {
    let results = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(obj_condition(obj))
        .all(db)
        .await?;
    Ok(results.into_iter().map(|m| m.permission).collect())
}

/// IDs of users directly granted `permission` for `obj`.
pub async fn user_ids_with(
    db: &DatabaseConnection,
    permission: &str,
    obj: Option<i64>,
) -> AppResult<Vec<i32>> {
    let results = user_permission::Entity::find()
        .filter(user_permission::Column::Permission.eq(permission))
        .filter(obj_condition(obj))
        .all(db)
        .await?;
    let mut ids: Vec<i32> = results.into_iter().map(|m| m.user_id).collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}
