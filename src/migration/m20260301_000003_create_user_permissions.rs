//! Create user_permissions table.

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
                    .table(UserPermission::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPermission::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserPermission::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(UserPermission::Permission)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserPermission::ObjId)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(UserPermission::Table, UserPermission::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_permissions_permission")
                    .table(UserPermission::Table)
                    .col(UserPermission::Permission)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_permissions_grant")
                    .table(UserPermission::Table)
                    .col(UserPermission::UserId)
                    .col(UserPermission::Permission)
                    .col(UserPermission::ObjId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPermission::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum UserPermission {
    #[sea_orm(iden = "user_permissions")]
    Table,
    Id,
    UserId,
    Permission,
    ObjId,
}
