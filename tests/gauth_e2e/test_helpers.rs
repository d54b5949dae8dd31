//! Shared test helpers for gauth E2E tests.

use std::sync::Arc;

use actix_web::{App, dev::ServiceResponse, test, web};
use gauth_lib::auth::AdminKey;
use gauth_lib::config::{
    Config, DatabaseSettings, Environment, OAuthProviderSettings, defaults,
};
use gauth_lib::db::DbPool;
use gauth_lib::models::oauth::TokenBundle;
use gauth_lib::models::user::{ExtraFields, User};
use gauth_lib::services::{AuthServices, OAuthProvider};
use serde_json::Value;

use super::mock_provider::MockProvider;

/// Admin key used in tests.
pub const TEST_ADMIN_KEY: &str = "test-admin-key-for-gauth-e2e";
/// Application identity used in tests.
pub const TEST_APP_ID: &str = "s~gauth-test";
/// Password given to users created by [`create_test_user`].
pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Configuration for tests: in-memory SQLite, `blog.post` and `blog.comment`
/// permissions, and the given backends.
pub fn test_config(backends: &[&str]) -> Config {
    Config {
        environment: Environment::Development,
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            // One connection: every in-memory connection is its own database
            max_connections: 1,
            min_connections: 1,
        },
        admin_key: Some(TEST_ADMIN_KEY.to_string()),
        application_id: TEST_APP_ID.to_string(),
        auth_backends: backends.iter().map(|b| b.to_string()).collect(),
        permission_models: vec!["blog.post".to_string(), "blog.comment".to_string()],
        oauth: OAuthProviderSettings {
            token_uri: defaults::OAUTH_TOKEN_URI.to_string(),
        },
    }
}

/// Create a fresh migrated database.
pub async fn create_test_pool() -> DbPool {
    let config = test_config(&["model"]);
    let pool = DbPool::new(&config)
        .await
        .expect("Failed to open in-memory database");
    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    pool
}

/// Create a migrated SQLite database file in `dir` with a real pool, so
/// concurrent callers hold separate connections.
pub async fn create_file_pool(dir: &tempfile::TempDir, max_connections: u32) -> DbPool {
    let path = dir.path().join("gauth.db");
    let settings = DatabaseSettings {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections,
        min_connections: 1,
    };
    let pool = DbPool::connect(&settings)
        .await
        .expect("Failed to open file database");
    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    pool
}

/// Services wired to `pool` with the given backends and a scripted provider.
pub fn build_services(pool: &DbPool, backends: &[&str], provider: Arc<MockProvider>) -> AuthServices {
    let config = test_config(backends);
    AuthServices::with_provider(pool, &config, provider as Arc<dyn OAuthProvider>)
        .expect("Failed to build services")
}

/// Pool plus services using only the model backend.
pub async fn setup() -> (DbPool, AuthServices, Arc<MockProvider>) {
    let pool = create_test_pool().await;
    let provider = Arc::new(MockProvider::new());
    let services = build_services(&pool, &["model"], provider.clone());
    (pool, services, provider)
}

/// Create a regular active user with [`TEST_PASSWORD`].
pub async fn create_test_user(services: &AuthServices, username: &str) -> User {
    services
        .users
        .create_user(
            username,
            Some(&format!("{}@example.com", username)),
            Some(TEST_PASSWORD),
            ExtraFields::default(),
        )
        .await
        .expect("Failed to create test user")
}

/// Create a user with explicit flags.
pub async fn create_user_with(
    services: &AuthServices,
    username: &str,
    extra: ExtraFields,
) -> User {
    services
        .users
        .create_user(username, None, Some(TEST_PASSWORD), extra)
        .await
        .expect("Failed to create test user")
}

/// Seed the credentials row the session service needs.
pub async fn seed_credentials(services: &AuthServices) {
    services
        .credentials
        .get_or_create(gauth_lib::models::oauth::CredentialsDefaults {
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
        })
        .await
        .expect("Failed to seed credentials");
}

/// Token bundle as a provider would return it.
pub fn token_bundle(access_token: &str, refresh_token: Option<&str>, expires_in: i64) -> TokenBundle {
    let mut raw = serde_json::json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "openid email profile",
    });
    if let Some(refresh) = refresh_token {
        raw["refresh_token"] = Value::String(refresh.to_string());
    }
    TokenBundle::from_response(raw).expect("valid token bundle")
}

/// Create the admin test app.
pub async fn create_test_app(
    pool: &DbPool,
    services: &AuthServices,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let admin_key = AdminKey::new(Some(TEST_ADMIN_KEY.to_string()));
    let services = services.clone();

    test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(admin_key))
            .configure(|cfg| services.register(cfg))
            .service(web::scope("/api/v1").configure(gauth_lib::api::configure_routes)),
    )
    .await
}

/// Send a request and return status plus JSON body (`Null` for empty bodies).
pub async fn send<S>(app: &S, req: test::TestRequest) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}
