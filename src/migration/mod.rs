//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_groups;
mod m20260301_000003_create_user_permissions;
mod m20260301_000004_create_app_oauth_credentials;
mod m20260301_000005_create_oauth_user_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users::Migration),
            Box::new(m20260301_000002_create_groups::Migration),
            Box::new(m20260301_000003_create_user_permissions::Migration),
            Box::new(m20260301_000004_create_app_oauth_credentials::Migration),
            Box::new(m20260301_000005_create_oauth_user_sessions::Migration),
        ]
    }
}
