//! Database operations for OAuth app credentials.

use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use crate::entity::app_oauth_credentials;
use crate::error::AppResult;
use crate::models::oauth::AppOAuthCredentials;

/// Find the credentials row for an application identity.
pub async fn find(db: &DatabaseConnection, app_id: &str) -> AppResult<Option<AppOAuthCredentials>> {
    let result = app_oauth_credentials::Entity::find_by_id(app_id.to_string())
        .one(db)
        .await?;
    Ok(result.map(AppOAuthCredentials::from))
}

/// Insert a row unless one already exists. Returns whether this call created it.
pub async fn insert_if_absent(
    db: &DatabaseConnection,
    app_id: &str,
    client_id: &str,
    client_secret: &str,
) -> AppResult<bool> {
    let model = app_oauth_credentials::ActiveModel {
        id: Set(app_id.to_string()),
        client_id: Set(client_id.to_string()),
        client_secret: Set(client_secret.to_string()),
    };

    let result = app_oauth_credentials::Entity::insert(model)
        .on_conflict(
            OnConflict::column(app_oauth_credentials::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(rows) => Ok(rows > 0),
        Err(DbErr::RecordNotInserted) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Overwrite the client id and secret. Returns whether a row was updated.
pub async fn update(
    db: &DatabaseConnection,
    app_id: &str,
    client_id: &str,
    client_secret: &str,
) -> AppResult<bool> {
    let result = app_oauth_credentials::Entity::update_many()
        .col_expr(
            app_oauth_credentials::Column::ClientId,
            sea_orm::sea_query::Expr::value(client_id),
        )
        .col_expr(
            app_oauth_credentials::Column::ClientSecret,
            sea_orm::sea_query::Expr::value(client_secret),
        )
        .filter(app_oauth_credentials::Column::Id.eq(app_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}
