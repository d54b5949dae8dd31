//! gauth server library.
//!
//! Users, groups, permissions and OAuth2 token sessions for a pluggable
//! authentication layer, plus the actix-web admin surface over them.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
