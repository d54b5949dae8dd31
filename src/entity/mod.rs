//! SeaORM entity definitions.

pub mod app_oauth_credentials;
pub mod group;
pub mod oauth_user_session;
pub mod user;
pub mod user_group;
pub mod user_permission;
