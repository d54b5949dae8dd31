//! Database operations for OAuth user sessions.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;

use crate::entity::oauth_user_session::{self, Column};
use crate::error::{AppError, AppResult};
use crate::models::encode_set;
use crate::models::oauth::{OAuthUserSession, TokenBundle};

/// Find the session linked to a user.
pub async fn find(db: &DatabaseConnection, user_id: i32) -> AppResult<Option<OAuthUserSession>> {
    let result = oauth_user_session::Entity::find_by_id(user_id).one(db).await?;
    Ok(result.map(OAuthUserSession::from))
}

/// Find the session holding an access token.
pub async fn find_by_access_token(
    db: &DatabaseConnection,
    access_token: &str,
) -> AppResult<Option<OAuthUserSession>> {
    if access_token.is_empty() {
        return Ok(None);
    }
    let result = oauth_user_session::Entity::find()
        .filter(Column::AccessToken.eq(access_token))
        .one(db)
        .await?;
    Ok(result.map(OAuthUserSession::from))
}

/// Link a token bundle to a user, replacing any existing session.
///
/// A bundle without a refresh token keeps the one already stored, since
/// providers only issue it on first consent.
pub async fn upsert(
    db: &DatabaseConnection,
    user_id: i32,
    authorization_code: &str,
    bundle: &TokenBundle,
    now: DateTime<Utc>,
) -> AppResult<OAuthUserSession> {
    let mut update_columns = vec![
        Column::AuthorizationCode,
        Column::AccessToken,
        Column::IdToken,
        Column::TokenType,
        Column::ExpiresAt,
        Column::ExpiresIn,
        Column::Scopes,
        Column::Token,
        Column::RefreshedAt,
        Column::RevokedAt,
        Column::UpdatedAt,
    ];
    if bundle.refresh_token.is_some() {
        update_columns.push(Column::RefreshToken);
    }

    let model = oauth_user_session::ActiveModel {
        user_id: Set(user_id),
        authorization_code: Set(authorization_code.to_string()),
        access_token: Set(bundle.access_token.clone()),
        refresh_token: Set(bundle.refresh_token.clone().unwrap_or_default()),
        id_token: Set(bundle.id_token.clone().unwrap_or_default()),
        token_type: Set(bundle.token_type.clone()),
        expires_at: Set(bundle.expires_at(now)),
        expires_in: Set(bundle.expires_in),
        scopes: Set(bundle.scopes.as_ref().map(encode_set).unwrap_or_default()),
        token: Set(bundle.raw.clone()),
        refreshed_at: Set(None),
        revoked_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    oauth_user_session::Entity::insert(model)
        .on_conflict(
            OnConflict::column(Column::UserId)
                .update_columns(update_columns)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find(db, user_id)
        .await?
        .ok_or_else(|| AppError::Database("Failed to fetch linked OAuth session".to_string()))
}

/// Store refreshed tokens, but only if the session still holds
/// `old_refresh_token` and is not revoked. Returns whether this call won.
pub async fn apply_refresh(
    db: &DatabaseConnection,
    user_id: i32,
    old_refresh_token: &str,
    bundle: &TokenBundle,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let mut update = oauth_user_session::Entity::update_many()
        .col_expr(Column::AccessToken, Expr::value(bundle.access_token.clone()))
        .col_expr(Column::TokenType, Expr::value(bundle.token_type.clone()))
        .col_expr(Column::ExpiresIn, Expr::value(bundle.expires_in))
        .col_expr(Column::ExpiresAt, Expr::value(bundle.expires_at(now)))
        .col_expr(Column::Token, Expr::value(bundle.raw.clone()))
        .col_expr(Column::RefreshedAt, Expr::value(Some(now)))
        .col_expr(Column::UpdatedAt, Expr::value(now));

    if let Some(ref id_token) = bundle.id_token {
        update = update.col_expr(Column::IdToken, Expr::value(id_token.clone()));
    }
    if let Some(ref refresh_token) = bundle.refresh_token {
        update = update.col_expr(Column::RefreshToken, Expr::value(refresh_token.clone()));
    }
    if let Some(ref scopes) = bundle.scopes {
        update = update.col_expr(Column::Scopes, Expr::value(encode_set(scopes)));
    }

    let result = update
        .filter(Column::UserId.eq(user_id))
        .filter(Column::RefreshToken.eq(old_refresh_token))
        .filter(Column::RevokedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Clear the tokens and mark the session revoked. With `expected_refresh_token`
/// the update only applies while that token is still current.
pub async fn mark_revoked(
    db: &DatabaseConnection,
    user_id: i32,
    expected_refresh_token: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let mut update = oauth_user_session::Entity::update_many()
        .col_expr(Column::AccessToken, Expr::value(""))
        .col_expr(Column::RefreshToken, Expr::value(""))
        .col_expr(Column::IdToken, Expr::value(""))
        .col_expr(Column::RevokedAt, Expr::value(Some(now)))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::UserId.eq(user_id));

    if let Some(expected) = expected_refresh_token {
        update = update.filter(Column::RefreshToken.eq(expected));
    }

    let result = update.exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Delete the session row. Returns whether one existed.
pub async fn delete(db: &DatabaseConnection, user_id: i32) -> AppResult<bool> {
    let result = oauth_user_session::Entity::delete_by_id(user_id)
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}
