//! OAuth session lifecycle against a scripted provider.

use chrono::{Duration, Utc};
use gauth_lib::entity::user;
use gauth_lib::error::AppError;
use gauth_lib::models::oauth::SessionState;
use gauth_lib::models::user::ExtraFields;
use gauth_lib::services::ProviderError;
use sea_orm::EntityTrait;
use secrecy::ExposeSecret;

use super::test_helpers::*;

#[actix_rt::test]
async fn test_link_stores_bundle() {
    let (_pool, services, _) = setup().await;
    let user = create_test_user(&services, "linked").await;

    let before = Utc::now();
    let session = services
        .sessions
        .link(user.id, "4/auth-code", &token_bundle("ya29.one", Some("1//one"), 3600))
        .await
        .unwrap();

    assert_eq!(session.user_id, user.id);
    assert_eq!(session.access_token.expose_secret(), "ya29.one");
    assert_eq!(session.refresh_token.expose_secret(), "1//one");
    assert_eq!(session.authorization_code.expose_secret(), "4/auth-code");
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.expires_in, Some(3600));
    let expires_at = session.expires_at.expect("expiry derived from expires_in");
    assert!(expires_at >= before + Duration::seconds(3599));
    assert!(session.has_scope("email"));
    assert!(session.has_scope("openid"));
    assert_eq!(session.token["access_token"], "ya29.one");

    assert!(services.sessions.is_valid(user.id).await.unwrap());
    assert_eq!(
        services.sessions.state(user.id, Utc::now()).await.unwrap(),
        SessionState::Linked
    );
}

#[actix_rt::test]
async fn test_link_unknown_user() {
    let (_pool, services, _) = setup().await;

    let err = services
        .sessions
        .link(999, "code", &token_bundle("ya29.x", None, 3600))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_relink_replaces_session_and_keeps_refresh_token() {
    let (_pool, services, _) = setup().await;
    let user = create_test_user(&services, "relink").await;

    services
        .sessions
        .link(user.id, "code-1", &token_bundle("ya29.one", Some("1//keep"), 3600))
        .await
        .unwrap();
    services.sessions.revoke(user.id).await.unwrap();

    let session = services
        .sessions
        .link(user.id, "code-2", &token_bundle("ya29.two", None, 3600))
        .await
        .unwrap();

    assert_eq!(session.access_token.expose_secret(), "ya29.two");
    assert_eq!(session.authorization_code.expose_secret(), "code-2");
    assert!(!session.is_revoked(), "relinking clears revocation");
    // Revocation cleared the stored refresh token, and the new bundle had none
    assert!(!session.has_refresh_token());

    services
        .sessions
        .link(user.id, "code-3", &token_bundle("ya29.three", Some("1//new"), 3600))
        .await
        .unwrap();
    let session = services
        .sessions
        .link(user.id, "code-4", &token_bundle("ya29.four", None, 3600))
        .await
        .unwrap();
    assert_eq!(session.access_token.expose_secret(), "ya29.four");
    assert_eq!(session.refresh_token.expose_secret(), "1//new");
}

#[actix_rt::test]
async fn test_validity() {
    let (_pool, services, _) = setup().await;
    let user = create_test_user(&services, "validity").await;

    assert!(!services.sessions.is_valid(user.id).await.unwrap(), "no session");
    assert_eq!(
        services.sessions.state(user.id, Utc::now()).await.unwrap(),
        SessionState::Unlinked
    );

    let session = services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.short", Some("1//r"), 60))
        .await
        .unwrap();
    let now = Utc::now();
    assert!(session.is_valid_at(now));
    assert!(!session.is_valid_at(now + Duration::seconds(120)));
    assert_eq!(session.state_at(now + Duration::seconds(120)), SessionState::Expired);

    let stale = services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.stale", Some("1//r"), -30))
        .await
        .unwrap();
    assert!(!stale.is_valid());
    assert!(!services.sessions.is_valid(user.id).await.unwrap());
}

#[actix_rt::test]
async fn test_session_without_expiry_is_invalid() {
    let (_pool, services, _) = setup().await;
    let user = create_test_user(&services, "noexpiry").await;

    let bundle = gauth_lib::models::oauth::TokenBundle::from_response(serde_json::json!({
        "access_token": "ya29.forever",
    }))
    .unwrap();
    let session = services.sessions.link(user.id, "code", &bundle).await.unwrap();

    assert!(session.expires_at.is_none());
    assert!(!session.is_valid());
}

#[actix_rt::test]
async fn test_refresh_success() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "refresher").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.old", Some("1//old"), -10))
        .await
        .unwrap();
    assert!(!services.sessions.is_valid(user.id).await.unwrap());

    provider.push(Ok(token_bundle("ya29.new", None, 3600)));
    let session = services.sessions.refresh(user.id).await.unwrap();

    assert_eq!(provider.last_refresh_token().as_deref(), Some("1//old"));
    assert_eq!(session.access_token.expose_secret(), "ya29.new");
    assert_eq!(session.refresh_token.expose_secret(), "1//old", "kept without rotation");
    assert!(session.refreshed_at.is_some());
    assert!(session.is_valid());
    assert_eq!(session.state_at(Utc::now()), SessionState::Refreshed);
}

#[actix_rt::test]
async fn test_refresh_rotates_refresh_token() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "rotator").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    provider.push(Ok(token_bundle("ya29.b", Some("1//b"), 3600)));
    let session = services.sessions.refresh(user.id).await.unwrap();
    assert_eq!(session.refresh_token.expose_secret(), "1//b");

    provider.push(Ok(token_bundle("ya29.c", Some("1//c"), 3600)));
    services.sessions.refresh(user.id).await.unwrap();
    assert_eq!(provider.last_refresh_token().as_deref(), Some("1//b"));
}

#[actix_rt::test]
async fn test_concurrent_refresh_single_winner() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "racer").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), -10))
        .await
        .unwrap();

    provider.push(Ok(token_bundle("ya29.first", Some("1//first"), 3600)));
    provider.push(Ok(token_bundle("ya29.second", Some("1//second"), 3600)));

    let (a, b) = tokio::join!(
        services.sessions.refresh(user.id),
        services.sessions.refresh(user.id)
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_eq!(provider.calls(), 2);

    // Whatever interleaving happened, the stored row is one coherent bundle
    let stored = services.sessions.get(user.id).await.unwrap().unwrap();
    assert!(stored.is_valid());
    let pair = (
        stored.access_token.expose_secret().to_string(),
        stored.refresh_token.expose_secret().to_string(),
    );
    assert!(
        pair == ("ya29.first".to_string(), "1//first".to_string())
            || pair == ("ya29.second".to_string(), "1//second".to_string()),
        "unexpected stored tokens {:?}",
        pair
    );
    let returned = [
        a.access_token.expose_secret().to_string(),
        b.access_token.expose_secret().to_string(),
    ];
    assert!(returned.contains(&pair.0));
}

#[actix_rt::test]
async fn test_refresh_rejected_revokes() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "rejected").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    provider.push(Err(ProviderError::Rejected("invalid_grant".to_string())));
    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);

    let session = services.sessions.get(user.id).await.unwrap().unwrap();
    assert!(session.is_revoked());
    assert!(session.access_token.expose_secret().is_empty());
    assert!(!session.has_refresh_token());
    assert_eq!(session.state_at(Utc::now()), SessionState::Revoked);

    // A revoked session does not reach the provider again
    let calls = provider.calls();
    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);
    assert_eq!(provider.calls(), calls);
}

#[actix_rt::test]
async fn test_refresh_transport_failure_leaves_session() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "flaky").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    provider.push(Err(ProviderError::Transport("connection reset".to_string())));
    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)), "got {:?}", err);

    let session = services.sessions.get(user.id).await.unwrap().unwrap();
    assert!(!session.is_revoked());
    assert_eq!(session.access_token.expose_secret(), "ya29.a");
    assert_eq!(session.refresh_token.expose_secret(), "1//a");
    assert!(session.is_valid());
}

#[actix_rt::test]
async fn test_refresh_without_session_or_refresh_token() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "bare").await;

    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);

    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", None, 3600))
        .await
        .unwrap();
    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);
    assert!(services.sessions.get(user.id).await.unwrap().unwrap().is_revoked());
    assert_eq!(provider.calls(), 0);
}

#[actix_rt::test]
async fn test_refresh_without_credentials_is_configuration_error() {
    let (_pool, services, provider) = setup().await;
    let user = create_test_user(&services, "unconfigured").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    let err = services.sessions.refresh(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {:?}", err);
    assert_eq!(provider.calls(), 0);
    assert!(!services.sessions.get(user.id).await.unwrap().unwrap().is_revoked());
}

#[actix_rt::test]
async fn test_exchange_code_links_session() {
    let (_pool, services, provider) = setup().await;
    seed_credentials(&services).await;
    let user = create_test_user(&services, "exchanger").await;

    provider.push(Ok(token_bundle("ya29.code", Some("1//code"), 3600)));
    let session = services
        .sessions
        .exchange_code(user.id, "4/abc", "https://app.example.com/oauth2callback")
        .await
        .unwrap();
    assert_eq!(session.authorization_code.expose_secret(), "4/abc");
    assert!(session.is_valid());

    provider.push(Err(ProviderError::Rejected("invalid_grant".to_string())));
    let err = services
        .sessions
        .exchange_code(user.id, "4/used", "https://app.example.com/oauth2callback")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthRequired(_)), "got {:?}", err);
    // A failed exchange leaves the existing session alone
    assert!(services.sessions.is_valid(user.id).await.unwrap());
}

#[actix_rt::test]
async fn test_revoke_and_unlink() {
    let (_pool, services, _) = setup().await;
    let user = create_test_user(&services, "leaver").await;

    assert!(!services.sessions.revoke(user.id).await.unwrap());
    assert!(!services.sessions.unlink(user.id).await.unwrap());

    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    assert!(services.sessions.revoke(user.id).await.unwrap());
    let session = services.sessions.get(user.id).await.unwrap().unwrap();
    assert!(session.is_revoked());
    assert!(!session.is_valid());

    assert!(services.sessions.unlink(user.id).await.unwrap());
    assert!(services.sessions.get(user.id).await.unwrap().is_none());
    assert_eq!(
        services.sessions.state(user.id, Utc::now()).await.unwrap(),
        SessionState::Unlinked
    );
}

#[actix_rt::test]
async fn test_deleting_user_deletes_session() {
    let (pool, services, _) = setup().await;
    let user = create_test_user(&services, "doomed").await;
    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.a", Some("1//a"), 3600))
        .await
        .unwrap();

    user::Entity::delete_by_id(user.id)
        .exec(pool.connection())
        .await
        .unwrap();

    assert!(services.sessions.get(user.id).await.unwrap().is_none());
}

#[actix_rt::test]
async fn test_authenticate_bearer() {
    let (pool, services, _) = setup().await;
    let user = create_test_user(&services, "bearer").await;
    let other = create_user_with(
        &services,
        "expired",
        ExtraFields::default(),
    )
    .await;

    services
        .sessions
        .link(user.id, "code", &token_bundle("ya29.live", Some("1//a"), 3600))
        .await
        .unwrap();
    services
        .sessions
        .link(other.id, "code", &token_bundle("ya29.dead", Some("1//b"), -5))
        .await
        .unwrap();

    let identity = services.sessions.authenticate_bearer("ya29.live").await.unwrap();
    assert_eq!(identity.id(), Some(user.id));

    let identity = services.sessions.authenticate_bearer("ya29.dead").await.unwrap();
    assert!(identity.user().is_none());

    let identity = services.sessions.authenticate_bearer("unknown").await.unwrap();
    assert!(identity.user().is_none());

    let identity = services.sessions.authenticate_bearer("").await.unwrap();
    assert!(identity.user().is_none());

    gauth_lib::db::users::set_active(pool.connection(), user.id, false)
        .await
        .unwrap();
    let identity = services.sessions.authenticate_bearer("ya29.live").await.unwrap();
    assert!(identity.user().is_none(), "inactive users resolve to anonymous");
}
