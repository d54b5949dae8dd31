//! Permission checks and the "who holds this permission" lookup.

use std::sync::Arc;

use gauth_lib::error::AppError;
use gauth_lib::models::identity::RequestIdentity;
use gauth_lib::models::user::ExtraFields;
use gauth_lib::services::{BackendArg, WithPermOptions};
use serde_json::json;

use super::mock_provider::MockProvider;
use super::test_helpers::*;

const ADD_POST: &str = "blog.add_post";
const CHANGE_POST: &str = "blog.change_post";

fn ids(users: &[gauth_lib::models::user::User]) -> Vec<i32> {
    users.iter().map(|u| u.id).collect()
}

#[actix_rt::test]
async fn test_with_perm_direct_group_and_superuser() {
    let (_pool, services, _) = setup().await;

    let direct = create_test_user(&services, "direct").await;
    let member = create_test_user(&services, "member").await;
    let _bystander = create_test_user(&services, "bystander").await;
    let admin = create_user_with(
        &services,
        "admin",
        ExtraFields {
            is_superuser: Some(true),
            is_staff: Some(true),
            ..Default::default()
        },
    )
    .await;
    let sleeper = create_user_with(
        &services,
        "sleeper",
        ExtraFields {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await;

    services
        .permissions
        .grant_permission(direct.id, ADD_POST, None)
        .await
        .unwrap();
    services
        .permissions
        .grant_permission(sleeper.id, ADD_POST, None)
        .await
        .unwrap();
    let editors = services
        .permissions
        .create_group("editors", &[ADD_POST.to_string()])
        .await
        .unwrap();
    services
        .permissions
        .add_member(editors.id, member.id)
        .await
        .unwrap();

    let holders = services
        .users
        .with_perm(ADD_POST, WithPermOptions::default())
        .await
        .unwrap();
    assert_eq!(ids(&holders), vec![direct.id, member.id, admin.id]);

    let everyone = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                is_active: None,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        ids(&everyone),
        vec![direct.id, member.id, admin.id, sleeper.id]
    );

    let no_supers = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                include_superusers: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&no_supers), vec![direct.id, member.id]);

    let inactive_only = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&inactive_only), vec![sleeper.id]);
}

#[actix_rt::test]
async fn test_with_perm_object_scope() {
    let (_pool, services, _) = setup().await;
    let global = create_test_user(&services, "global").await;
    let scoped = create_test_user(&services, "scoped").await;

    services
        .permissions
        .grant_permission(global.id, CHANGE_POST, None)
        .await
        .unwrap();
    services
        .permissions
        .grant_permission(scoped.id, CHANGE_POST, Some(5))
        .await
        .unwrap();

    let options = |obj| WithPermOptions {
        include_superusers: false,
        obj,
        ..Default::default()
    };

    let none = services.users.with_perm(CHANGE_POST, options(None)).await.unwrap();
    assert_eq!(ids(&none), vec![global.id]);

    let five = services.users.with_perm(CHANGE_POST, options(Some(5))).await.unwrap();
    assert_eq!(ids(&five), vec![global.id, scoped.id]);

    let seven = services.users.with_perm(CHANGE_POST, options(Some(7))).await.unwrap();
    assert_eq!(ids(&seven), vec![global.id]);

    let err = services
        .users
        .with_perm(CHANGE_POST, options(Some(-1)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_with_perm_unknown_permission() {
    let (_pool, services, _) = setup().await;

    let err = services
        .users
        .with_perm("blog.publish_post", WithPermOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_with_perm_backend_selection() {
    let pool = create_test_pool().await;
    let services = build_services(&pool, &["model", "oauth"], Arc::new(MockProvider::new()));
    let user = create_test_user(&services, "writer").await;
    services
        .permissions
        .grant_permission(user.id, ADD_POST, None)
        .await
        .unwrap();

    // Two backends and no selector
    let err = services
        .users
        .with_perm(ADD_POST, WithPermOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {:?}", err);

    let by_name = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                backend: Some(BackendArg::from("model")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(ids(&by_name), vec![user.id]);

    // The OAuth backend has no permission lookup
    let oauth = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                backend: Some(BackendArg::from("oauth")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(oauth.is_empty());

    let err = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                backend: Some(BackendArg::Other(json!(42))),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TypeMismatch(_)), "got {:?}", err);

    let err = services
        .users
        .with_perm(
            ADD_POST,
            WithPermOptions {
                backend: Some(BackendArg::from("ldap")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_with_perm_without_backends() {
    let pool = create_test_pool().await;
    let services = build_services(&pool, &[], Arc::new(MockProvider::new()));

    let err = services
        .users
        .with_perm(ADD_POST, WithPermOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Configuration(_)), "got {:?}", err);
}

#[actix_rt::test]
async fn test_has_perm_sources() {
    let (_pool, services, _) = setup().await;
    let direct = create_test_user(&services, "direct").await;
    let member = create_test_user(&services, "member").await;
    let admin = create_user_with(
        &services,
        "admin",
        ExtraFields {
            is_superuser: Some(true),
            is_staff: Some(true),
            ..Default::default()
        },
    )
    .await;

    services
        .permissions
        .grant_permission(direct.id, ADD_POST, None)
        .await
        .unwrap();
    services
        .permissions
        .grant_permission(direct.id, CHANGE_POST, Some(3))
        .await
        .unwrap();
    let group = services
        .permissions
        .create_group("commenters", &["blog.add_comment".to_string()])
        .await
        .unwrap();
    services.permissions.add_member(group.id, member.id).await.unwrap();

    let backends = &services.backends;
    let direct = RequestIdentity::User(direct);
    let member = RequestIdentity::User(member);
    let admin = RequestIdentity::User(admin);
    let anonymous = RequestIdentity::default();

    assert!(backends.has_perm(&direct, ADD_POST, None).await.unwrap());
    assert!(!backends.has_perm(&direct, CHANGE_POST, None).await.unwrap());
    assert!(backends.has_perm(&direct, CHANGE_POST, Some(3)).await.unwrap());
    assert!(!backends.has_perm(&direct, CHANGE_POST, Some(4)).await.unwrap());

    assert!(backends.has_perm(&member, "blog.add_comment", None).await.unwrap());
    assert!(!backends.has_perm(&member, ADD_POST, None).await.unwrap());
    assert!(backends.has_module_perms(&member, "blog").await.unwrap());
    assert!(!backends.has_module_perms(&member, "shop").await.unwrap());

    assert!(backends.has_perm(&admin, "blog.delete_post", None).await.unwrap());
    assert!(backends.has_module_perms(&admin, "anything").await.unwrap());

    assert!(backends.has_perms(&direct, &[ADD_POST], None).await.unwrap());
    assert!(!backends.has_perms(&direct, &[ADD_POST, "blog.add_comment"], None).await.unwrap());

    assert!(!backends.has_perm(&anonymous, ADD_POST, None).await.unwrap());
    assert!(!backends.has_perms(&anonymous, &[], None).await.unwrap());
    assert!(!backends.has_module_perms(&anonymous, "blog").await.unwrap());
    assert!(backends.get_all_permissions(&anonymous, None).await.unwrap().is_empty());

    let all = backends.get_all_permissions(&direct, None).await.unwrap();
    assert!(all.contains(ADD_POST));
    assert!(!all.contains(CHANGE_POST));
}

#[actix_rt::test]
async fn test_inactive_user_holds_nothing() {
    let (_pool, services, _) = setup().await;
    let sleeper = create_user_with(
        &services,
        "sleeper",
        ExtraFields {
            is_active: Some(false),
            is_superuser: Some(true),
            is_staff: Some(true),
            ..Default::default()
        },
    )
    .await;
    services
        .permissions
        .grant_permission(sleeper.id, ADD_POST, None)
        .await
        .unwrap();

    let identity = RequestIdentity::User(sleeper);
    assert!(!services.backends.has_perm(&identity, ADD_POST, None).await.unwrap());
    assert!(!services.backends.has_module_perms(&identity, "blog").await.unwrap());
}

#[actix_rt::test]
async fn test_group_permissions_are_validated() {
    let (_pool, services, _) = setup().await;

    let err = services
        .permissions
        .create_group("bad", &["blog.fly_post".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);

    let group = services.permissions.create_group("ok", &[]).await.unwrap();
    let updated = services
        .permissions
        .set_group_permissions(group.id, &[CHANGE_POST.to_string(), ADD_POST.to_string()])
        .await
        .unwrap();
    assert_eq!(
        updated.permissions.iter().map(String::as_str).collect::<Vec<_>>(),
        vec![ADD_POST, CHANGE_POST]
    );

    let err = services.permissions.create_group("ok", &[]).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)), "got {:?}", err);
}
