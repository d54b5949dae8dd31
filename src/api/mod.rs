//! API endpoint modules.

pub mod groups;
pub mod health;
pub mod me;
pub mod oauth;
pub mod users;

use actix_web::web;

pub use groups::configure_routes as configure_group_routes;
pub use health::configure_health_routes;
pub use me::configure_routes as configure_me_routes;
pub use oauth::configure_routes as configure_oauth_routes;
pub use users::configure_routes as configure_user_routes;

/// Mount every route under the caller's scope (`/api/v1` in the server).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health_routes)
        .configure(configure_me_routes)
        .configure(configure_user_routes)
        .configure(configure_group_routes)
        .configure(configure_oauth_routes);
}
