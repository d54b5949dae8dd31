//! Create oauth_user_sessions table.
//!
//! Keyed by user id: at most one token bundle per user, removed with the user.

use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuthUserSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuthUserSession::UserId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::AuthorizationCode)
                            .string_len(150)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::AccessToken)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::RefreshToken)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::IdToken)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::TokenType)
                            .string_len(150)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(OAuthUserSession::ExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OAuthUserSession::ExpiresIn).big_integer())
                    .col(
                        ColumnDef::new(OAuthUserSession::Scopes)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(OAuthUserSession::Token).json().not_null())
                    .col(ColumnDef::new(OAuthUserSession::RefreshedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OAuthUserSession::RevokedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(OAuthUserSession::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OAuthUserSession::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(OAuthUserSession::Table, OAuthUserSession::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Bearer lookups resolve a request to its user by access token
        manager
            .create_index(
                Index::create()
                    .name("idx_oauth_user_sessions_access_token")
                    .table(OAuthUserSession::Table)
                    .col(OAuthUserSession::AccessToken)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuthUserSession::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum OAuthUserSession {
    #[sea_orm(iden = "oauth_user_sessions")]
    Table,
    UserId,
    AuthorizationCode,
    AccessToken,
    RefreshToken,
    IdToken,
    TokenType,
    ExpiresAt,
    ExpiresIn,
    Scopes,
    Token,
    RefreshedAt,
    RevokedAt,
    CreatedAt,
    UpdatedAt,
}
