//! gauth server - main entry point.
//!
//! Starts the Actix-web server with configured routes and middleware.

use actix_web::{App, HttpServer, web};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gauth_lib::api;
use gauth_lib::auth::AdminKey;
use gauth_lib::config::Config;
use gauth_lib::db::DbPool;
use gauth_lib::middleware::RequestLogger;
use gauth_lib::services::AuthServices;

/// Perform health check (for Docker healthcheck).
fn health_check() -> bool {
    Config::from_env().is_ok()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // --health-check is used by the Docker HEALTHCHECK
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(if health_check() { 0 } else { 1 });
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL and GAUTH_APPLICATION_ID must be set");
            error!("  - In production, values must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  gauth server");
    info!("  Environment: {}", config.environment);
    info!("  Application: {}", config.application_id);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let pool = DbPool::new(&config).await.map_err(std::io::Error::other)?;
    info!("Database connection established");
    pool.run_migrations().await.map_err(std::io::Error::other)?;

    let services = AuthServices::build(&pool, &config).map_err(std::io::Error::other)?;
    info!(
        backends = ?services.backends.names(),
        permissions = services.registry.choices().count(),
        "Authentication services ready"
    );

    let bind_address = config.bind_address();
    let admin_key = AdminKey::new(config.admin_key.clone());
    if !admin_key.is_configured() {
        info!("No GAUTH_ADMIN_KEY set; admin routes require a staff bearer token");
    }

    let worker_count = if config.is_development() {
        4
    } else {
        num_cpus::get()
    };
    info!(
        "Starting server at http://{} ({} workers)",
        bind_address, worker_count
    );

    HttpServer::new(move || {
        let services = services.clone();
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(admin_key.clone()))
            .configure(|cfg| services.register(cfg))
            .service(web::scope("/api/v1").configure(api::configure_routes))
    })
    .workers(worker_count)
    .bind(&bind_address)?
    .run()
    .await
}
