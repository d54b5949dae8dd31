//! Database operations for groups and group membership.

use std::collections::BTreeSet;

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

use crate::entity::{group, user_group};
use crate::error::{AppError, AppResult};
use crate::models::group::Group;
use crate::models::{decode_set, encode_set};

/// Create a group. Names are unique.
pub async fn insert(
    db: &DatabaseConnection,
    name: &str,
    permissions: &BTreeSet<String>,
) -> AppResult<Group> {
    let model = group::ActiveModel {
        name: Set(name.to_string()),
        permissions: Set(encode_set(permissions)),
        ..Default::default()
    };

    let inserted = model.insert(db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::InvalidInput(format!("A group named '{}' already exists.", name))
        }
        _ => e.into(),
    })?;
    Ok(inserted.into())
}

/// Find a group by ID.
pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<Option<Group>> {
    let result = group::Entity::find_by_id(id).one(db).await?;
    Ok(result.map(Group::from))
}

/// List all groups ordered by name.
pub async fn list(db: &DatabaseConnection) -> AppResult<Vec<Group>> {
    let results = group::Entity::find()
        .order_by_asc(group::Column::Name)
        .all(db)
        .await?;
    Ok(results.into_iter().map(Group::from).collect())
}

/// Replace a group's permission set.
pub async fn set_permissions(
    db: &DatabaseConnection,
    id: i32,
    permissions: &BTreeSet<String>,
) -> AppResult<bool> {
    let result = group::Entity::update_many()
        .col_expr(group::Column::Permissions, Expr::value(encode_set(permissions)))
        .filter(group::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Add a user to a group. Adding an existing member is a no-op.
pub async fn add_member(db: &DatabaseConnection, group_id: i32, user_id: i32) -> AppResult<()> {
    let model = user_group::ActiveModel {
        user_id: Set(user_id),
        group_id: Set(group_id),
    };

    let result = user_group::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([user_group::Column::UserId, user_group::Column::GroupId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove a user from a group. Returns whether a membership existed.
pub async fn remove_member(db: &DatabaseConnection, group_id: i32, user_id: i32) -> AppResult<bool> {
    let result = user_group::Entity::delete_many()
        .filter(user_group::Column::GroupId.eq(group_id))
        .filter(user_group::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Groups a user belongs to, ordered by name.
pub async fn groups_for_user(db: &DatabaseConnection, user_id: i32) -> AppResult<Vec<Group>> {
    let results = group::Entity::find()
        .inner_join(user_group::Entity)
        .filter(user_group::Column::UserId.eq(user_id))
        .order_by_asc(group::Column::Name)
        .all(db)
        .await?;
    Ok(results.into_iter().map(Group::from).collect())
}

/// IDs of users belonging to any group whose set contains `permission`.
pub async fn member_ids_with_permission(
    db: &DatabaseConnection,
    permission: &str,
) -> AppResult<Vec<i32>> {
    // Sets are space-separated text, so filter in memory for an exact member match.
    let group_ids: Vec<i32> = group::Entity::find()
        .filter(group::Column::Permissions.contains(permission))
        .all(db)
        .await?
        .into_iter()
        .filter(|g| decode_set(&g.permissions).contains(permission))
        .map(|g| g.id)
        .collect();

    if group_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<i32> = user_group::Entity::find()
        .filter(user_group::Column::GroupId.is_in(group_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}
