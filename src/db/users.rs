//! Database operations for users.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::entity::user;
use crate::error::{AppError, AppResult};
use crate::models::user::{User, email_lower};

pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const DUPLICATE_EMAIL: &str = "A user with that email already exists.";

/// Fields for a new user row. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

/// Insert a user, rejecting duplicate usernames and (case-insensitive) emails.
pub async fn insert(db: &DatabaseConnection, new_user: NewUser) -> AppResult<User> {
    let lower = email_lower(&new_user.email);

    if find_by_username(db, &new_user.username).await?.is_some() {
        return Err(AppError::InvalidInput(DUPLICATE_USERNAME.to_string()));
    }
    if let Some(ref lower) = lower
        && exists_by_email_lower(db, lower).await?
    {
        return Err(AppError::InvalidInput(DUPLICATE_EMAIL.to_string()));
    }

    let model = user::ActiveModel {
        username: Set(new_user.username),
        password: Set(new_user.password),
        first_name: Set(new_user.first_name),
        last_name: Set(new_user.last_name),
        email: Set(new_user.email),
        email_lower: Set(lower),
        is_staff: Set(new_user.is_staff),
        is_superuser: Set(new_user.is_superuser),
        is_active: Set(new_user.is_active),
        last_login: Set(None),
        date_joined: Set(Utc::now()),
        ..Default::default()
    };

    // The pre-checks race with concurrent inserts; the unique indexes decide.
    let inserted = model.insert(db).await.map_err(map_unique_violation)?;
    Ok(inserted.into())
}

fn map_unique_violation(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            if detail.contains("email") {
                AppError::InvalidInput(DUPLICATE_EMAIL.to_string())
            } else {
                AppError::InvalidInput(DUPLICATE_USERNAME.to_string())
            }
        }
        _ => err.into(),
    }
}

async fn exists_by_email_lower(db: &DatabaseConnection, lower: &str) -> AppResult<bool> {
    let count = user::Entity::find()
        .filter(user::Column::EmailLower.eq(lower))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Find a user by ID.
pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<Option<User>> {
    let result = user::Entity::find_by_id(id).one(db).await?;
    Ok(result.map(User::from))
}

/// Find a user by ID, failing with `NotFound`.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> AppResult<User> {
    find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
}

/// Find a user by exact (already normalized) username.
pub async fn find_by_username(db: &DatabaseConnection, username: &str) -> AppResult<Option<User>> {
    let result = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;
    Ok(result.map(User::from))
}

/// List all users ordered by ID.
pub async fn list(db: &DatabaseConnection) -> AppResult<Vec<User>> {
    let results = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;
    Ok(results.into_iter().map(User::from).collect())
}

/// Activate or deactivate a user.
pub async fn set_active(db: &DatabaseConnection, id: i32, is_active: bool) -> AppResult<User> {
    let model = user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;

    let mut active: user::ActiveModel = model.into();
    active.is_active = Set(is_active);
    let updated = active.update(db).await?;
    Ok(updated.into())
}

/// Store a new password hash.
pub async fn update_password(db: &DatabaseConnection, id: i32, hash: &str) -> AppResult<bool> {
    let result = user::Entity::update_many()
        .col_expr(user::Column::Password, Expr::value(hash))
        .filter(user::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Record a successful login.
pub async fn touch_last_login(db: &DatabaseConnection, id: i32) -> AppResult<()> {
    user::Entity::update_many()
        .col_expr(user::Column::LastLogin, Expr::value(Some(Utc::now())))
        .filter(user::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Users whose id is in `ids`, plus every superuser when `include_superusers`.
/// `is_active` filters when set. Ordered by ID.
pub async fn find_with_perm(
    db: &DatabaseConnection,
    ids: &[i32],
    include_superusers: bool,
    is_active: Option<bool>,
) -> AppResult<Vec<User>> {
    if ids.is_empty() && !include_superusers {
        return Ok(Vec::new());
    }

    let mut holders = Condition::any();
    if !ids.is_empty() {
        holders = holders.add(user::Column::Id.is_in(ids.iter().copied()));
    }
    if include_superusers {
        holders = holders.add(user::Column::IsSuperuser.eq(true));
    }

    let mut query = user::Entity::find().filter(holders);
    if let Some(active) = is_active {
        query = query.filter(user::Column::IsActive.eq(active));
    }

    let results = query.order_by_asc(user::Column::Id).all(db).await?;
    Ok(results.into_iter().map(User::from).collect())
}
