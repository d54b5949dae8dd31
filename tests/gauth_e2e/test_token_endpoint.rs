//! HTTP token endpoint client against the mock token endpoint.

use gauth_lib::error::AppError;
use gauth_lib::models::oauth::AppOAuthCredentials;
use gauth_lib::services::{AuthServices, HttpOAuthProvider, OAuthProvider, ProviderError};
use secrecy::{ExposeSecret, SecretString};

use super::mock_token_endpoint;
use super::test_helpers::*;

fn credentials() -> AppOAuthCredentials {
    AppOAuthCredentials {
        id: "s~gauth-test".to_string(),
        client_id: "client-123".to_string(),
        client_secret: SecretString::from("shh".to_string()),
    }
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

#[actix_rt::test]
async fn test_exchange_code_posts_form() {
    let endpoint = mock_token_endpoint::start().await;
    let provider = HttpOAuthProvider::new(endpoint.token_uri.clone()).unwrap();

    let bundle = provider
        .exchange_code(&credentials(), &secret("good-code"), "https://app.example.com/cb")
        .await
        .expect("exchange should succeed");

    assert_eq!(bundle.access_token, "ya29.from-code");
    assert_eq!(bundle.refresh_token.as_deref(), Some("1//from-code"));
    assert_eq!(bundle.id_token.as_deref(), Some("eyJ.id.token"));
    assert_eq!(bundle.expires_in, Some(3599));
    let scopes = bundle.scopes.expect("scope reported");
    assert!(scopes.contains("openid"));
    assert!(scopes.contains("https://www.googleapis.com/auth/userinfo.email"));

    let received = endpoint.received.lock().unwrap();
    let form = received.last().expect("request recorded");
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "good-code");
    assert_eq!(form["redirect_uri"], "https://app.example.com/cb");
    assert_eq!(form["client_id"], "client-123");
    assert_eq!(form["client_secret"], "shh");
}

#[actix_rt::test]
async fn test_refresh_success_with_string_expiry() {
    let endpoint = mock_token_endpoint::start().await;
    let provider = HttpOAuthProvider::new(endpoint.token_uri.clone()).unwrap();

    let bundle = provider
        .refresh(&credentials(), &secret("good-refresh"))
        .await
        .expect("refresh should succeed");

    assert_eq!(bundle.access_token, "ya29.refreshed");
    assert_eq!(bundle.refresh_token, None);
    assert_eq!(bundle.expires_in, Some(3599));
    assert_eq!(bundle.scopes, None);

    let received = endpoint.received.lock().unwrap();
    let form = received.last().expect("request recorded");
    assert_eq!(form["grant_type"], "refresh_token");
    assert_eq!(form["refresh_token"], "good-refresh");
}

#[actix_rt::test]
async fn test_refresh_invalid_grant_is_rejected() {
    let endpoint = mock_token_endpoint::start().await;
    let provider = HttpOAuthProvider::new(endpoint.token_uri.clone()).unwrap();

    let err = provider
        .refresh(&credentials(), &secret("revoked-refresh"))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Rejected("invalid_grant".to_string()));
}

#[actix_rt::test]
async fn test_refresh_server_error_is_transport() {
    let endpoint = mock_token_endpoint::start().await;
    let provider = HttpOAuthProvider::new(endpoint.token_uri.clone()).unwrap();

    let err = provider
        .refresh(&credentials(), &secret("flaky-refresh"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "got {:?}", err);

    let err = provider
        .refresh(&credentials(), &secret("garbled-refresh"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_unreachable_endpoint_is_transport() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let provider = HttpOAuthProvider::new(format!("http://127.0.0.1:{}/token", port)).unwrap();

    let err = provider
        .refresh(&credentials(), &secret("good-refresh"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_unrepresentable_expiry_is_transport() {
    let endpoint = mock_token_endpoint::start().await;
    let provider = HttpOAuthProvider::new(endpoint.token_uri.clone()).unwrap();

    let err = provider
        .refresh(&credentials(), &secret("huge-expiry-refresh"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProviderError::Transport(ref msg) if msg.contains("expires_in")),
        "got {:?}",
        err
    );
}

#[actix_rt::test]
async fn test_session_refresh_survives_unrepresentable_expiry() {
    let endpoint = mock_token_endpoint::start().await;
    let pool = create_test_pool().await;
    let mut config = test_config(&["model"]);
    config.oauth.token_uri = endpoint.token_uri.clone();
    let services = AuthServices::build(&pool, &config).unwrap();
    seed_credentials(&services).await;
    let user = create_test_user(&services, "overflow").await;
    services
        .sessions
        .link(
            user.id,
            "code",
            &token_bundle("ya29.current", Some("huge-expiry-refresh"), 3600),
        )
        .await
        .unwrap();

    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)), "got {:?}", err);

    let session = services.sessions.get(user.id).await.unwrap().unwrap();
    assert!(!session.is_revoked());
    assert_eq!(session.access_token.expose_secret(), "ya29.current");
    assert!(session.is_valid());
}
