//! Service-level tests over the seeded platform, without HTTP.

mod common;

use gm_platform::auth::dto::LoginRequest;
use gm_platform::auth::refresh_token::{REASON_REPLACED, REASON_REUSE, REASON_USER_DELETED};
use gm_platform::auth::refresh_token_repository::RefreshTokenRepository;
use gm_platform::role::dto::CreateRoleRequest;
use gm_platform::shared::middleware::ClientInfo;
use gm_platform::shared::unit_of_work::UnitOfWork;
use gm_platform::user::dto::{AssignRolesRequest, CreateUserRequest};
use gm_platform::user::repository::UserRepository;
use gm_platform::{OperationError, Role};

use common::{spawn, PASSWORD};

fn client() -> ClientInfo {
    ClientInfo {
        ip_address: Some("198.51.100.20".to_string()),
        user_agent: Some("service-tests".to_string()),
    }
}

fn new_user(user_name: &str) -> CreateUserRequest {
    CreateUserRequest {
        user_name: user_name.to_string(),
        email: format!("{}@plant.example", user_name),
        password: PASSWORD.to_string(),
        ..Default::default()
    }
}

fn login(user_name: &str) -> LoginRequest {
    LoginRequest {
        user_name_or_email: user_name.to_string(),
        password: PASSWORD.to_string(),
    }
}

mod user_service_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_role_on_create_is_a_field_error() {
        let app = spawn().await;
        let mut req = new_user("mjones");
        req.roles = vec!["Ghost".to_string()];

        let err = app.platform.users.create_user(req, None).await.unwrap_err();
        match err {
            OperationError::Validation { fields, .. } => assert!(fields.contains_key("roles")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_role_on_assign_is_not_found() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();

        let err = app
            .platform
            .users
            .assign_roles(&user.id, AssignRolesRequest { roles: vec!["Ghost".to_string()] }, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_delete_revokes_every_refresh_token() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        app.platform.authentication.login(login("mjones"), &client()).await.unwrap();
        app.platform.authentication.login(login("mjones"), &client()).await.unwrap();

        app.platform.users.delete_user(&user.id, "someone-else").await.unwrap();

        let tokens = RefreshTokenRepository::new(app.platform.pool.clone())
            .find_by_user(&user.id)
            .await
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| !t.is_active()));
        assert!(tokens.iter().all(|t| t.revoked_reason.as_deref() == Some(REASON_USER_DELETED)));

        // the row remains, flagged
        let stored = UserRepository::new(app.platform.pool.clone())
            .get_by_id(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_deleted);
        assert!(!stored.is_active);
    }

    #[tokio::test]
    async fn test_user_name_stays_reserved_after_delete() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        app.platform.users.delete_user(&user.id, "someone-else").await.unwrap();

        let err = app.platform.users.create_user(new_user("mjones"), None).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_USER_NAME");
    }
}

mod authentication_service_tests {
    use super::*;

    #[tokio::test]
    async fn test_rotation_links_successor_and_reuse_revokes_all_tokens() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        let auth = &app.platform.authentication;

        let first = auth.login(login("mjones"), &client()).await.unwrap();
        let second = auth.refresh(&first.refresh_token, &client()).await.unwrap();

        let repo = RefreshTokenRepository::new(app.platform.pool.clone());
        let tokens = repo.find_by_user(&user.id).await.unwrap();
        let replaced = tokens.iter().find(|t| t.revoked_reason.as_deref() == Some(REASON_REPLACED)).unwrap();
        assert!(replaced.replaced_by_token_hash.is_some());
        assert_eq!(repo.find_active_by_user(&user.id).await.unwrap().len(), 1);

        let err = auth.refresh(&first.refresh_token, &client()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
        assert!(repo.find_active_by_user(&user.id).await.unwrap().is_empty());

        let reused = repo.find_by_user(&user.id).await.unwrap();
        assert!(reused.iter().any(|t| t.revoked_reason.as_deref() == Some(REASON_REUSE)));

        let err = auth.refresh(&second.refresh_token, &client()).await.unwrap_err();
        assert!(matches!(err, OperationError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_redeems_token_once() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        let auth = &app.platform.authentication;
        let session = auth.login(login("mjones"), &client()).await.unwrap();

        let (a, b) = tokio::join!(
            auth.refresh(&session.refresh_token, &client()),
            auth.refresh(&session.refresh_token, &client()),
        );

        let (ok, err): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
        assert_eq!(ok.len(), 1);
        assert_eq!(err.len(), 1);
        let err = err.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");

        // the loser is treated as reuse, so the winner's successor is revoked too
        let repo = RefreshTokenRepository::new(app.platform.pool.clone());
        assert!(repo.find_active_by_user(&user.id).await.unwrap().is_empty());
        let replaced = repo
            .find_by_user(&user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.revoked_reason.as_deref() == Some(REASON_REPLACED))
            .count();
        assert_eq!(replaced, 1);

        let alerts = app.platform.security.list_alerts(true, None).await.unwrap();
        assert!(alerts
            .iter()
            .any(|a| a.severity == "Critical" && a.user_id.as_deref() == Some(user.id.as_str())));
    }

    #[tokio::test]
    async fn test_locked_user_cannot_refresh() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        let session = app.platform.authentication.login(login("mjones"), &client()).await.unwrap();

        app.platform
            .users
            .lock_user(&user.id, Default::default(), "admin")
            .await
            .unwrap();

        let err = app
            .platform
            .authentication
            .refresh(&session.refresh_token, &client())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_successful_login_resets_failed_count() {
        let app = spawn().await;
        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        let auth = &app.platform.authentication;

        let mut wrong = login("mjones");
        wrong.password = "Wrong123!".to_string();
        auth.login(wrong.clone(), &client()).await.unwrap_err();
        auth.login(wrong, &client()).await.unwrap_err();

        let profile = app.platform.users.get_user(&user.id).await.unwrap();
        assert_eq!(profile.access_failed_count, 2);

        let session = auth.login(login("mjones"), &client()).await.unwrap();
        assert_eq!(session.user.access_failed_count, 0);
        assert!(session.user.last_login_date.is_some());
    }
}

mod role_service_tests {
    use super::*;

    #[tokio::test]
    async fn test_deleting_role_removes_assignments() {
        let app = spawn().await;
        let role = app
            .platform
            .roles
            .create_role(
                CreateRoleRequest {
                    name: "Planner".to_string(),
                    description: Some("Maintenance planning".to_string()),
                    permissions: vec!["users.read".to_string()],
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(role.permissions, vec!["users.read".to_string()]);

        let user = app.platform.users.create_user(new_user("mjones"), None).await.unwrap();
        app.platform
            .users
            .assign_roles(&user.id, AssignRolesRequest { roles: vec!["Planner".to_string()] }, None)
            .await
            .unwrap();

        app.platform.roles.delete_role(&role.id).await.unwrap();

        let roles = app.platform.users.get_user_roles(&user.id).await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["User"]);

        let err = app.platform.roles.get_role(&role.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}

mod unit_of_work_tests {
    use super::*;
    use gm_platform::role::repository::RoleRepository;

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let app = spawn().await;
        let repo = RoleRepository::new(app.platform.pool.clone());

        {
            let mut uow = UnitOfWork::begin(&app.platform.pool).await.unwrap();
            repo.add_with(uow.conn(), &Role::new("Scratch")).await.unwrap();
        }

        assert!(repo.find_by_name("Scratch").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_unit_of_work_persists() {
        let app = spawn().await;
        let repo = RoleRepository::new(app.platform.pool.clone());

        let mut uow = UnitOfWork::begin(&app.platform.pool).await.unwrap();
        repo.add_with(uow.conn(), &Role::new("Scratch")).await.unwrap();
        uow.commit().await.unwrap();

        assert!(repo.find_by_name("Scratch").await.unwrap().is_some());
    }
}
