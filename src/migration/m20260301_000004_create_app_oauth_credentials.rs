//! Create app_oauth_credentials table.
//!
//! One row per deployed application identity; the primary key is the
//! application id so concurrent first access cannot create duplicates.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppOAuthCredentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AppOAuthCredentials::Id)
                            .string_len(100)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AppOAuthCredentials::ClientId)
                            .string_len(150)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(AppOAuthCredentials::ClientSecret)
                            .string_len(150)
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AppOAuthCredentials::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum AppOAuthCredentials {
    #[sea_orm(iden = "app_oauth_credentials")]
    Table,
    Id,
    ClientId,
    ClientSecret,
}
