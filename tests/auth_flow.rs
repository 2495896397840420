mod common;

use std::time::Duration;

use safenow_client::auth::{ChangePasswordRequest, PreferencesUpdate, RegisterRequest};
use safenow_client::http::{endpoints, ApiRequest};
use safenow_client::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use safenow_client::{AppError, AuthState, User};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, ResponseTemplate,
};

fn login_response(access: &str, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": "Login successful",
        "user": common::user_json("kasia"),
        "tokens": {"access": access, "refresh": refresh}
    }))
}

#[test_log::test(tokio::test)]
async fn test_login_persists_session() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"username": "kasia", "password": "Str0ng-pass"})))
        .respond_with(login_response("access-1", "refresh-1"))
        .expect(1)
        .mount(&server)
        .await;

    let mut states = app.auth.watch();
    let user = app.auth.login("kasia", "Str0ng-pass").await.unwrap();

    assert_eq!(user.username, "kasia");
    assert_eq!(app.store().access().as_deref(), Some("access-1"));
    assert_eq!(app.store().refresh().as_deref(), Some("refresh-1"));
    assert_eq!(app.store().user(), Some(user.clone()));
    assert_eq!(app.auth.state(), AuthState::Authenticated(user));
    assert!(states.has_changed().unwrap());
    assert!(states.borrow_and_update().is_authenticated());
}

#[test_log::test(tokio::test)]
async fn test_login_accepts_flat_token_response() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "flat-access",
            "refresh": "flat-refresh",
            "user": common::user_json("kasia")
        })))
        .mount(&server)
        .await;

    app.auth.login("kasia@example.com", "Str0ng-pass").await.unwrap();
    assert_eq!(app.store().access().as_deref(), Some("flat-access"));
    assert_eq!(app.store().refresh().as_deref(), Some("flat-refresh"));
}

#[test_log::test(tokio::test)]
async fn test_bad_credentials_move_to_error_state() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "non_field_errors": ["Unable to log in with provided credentials."]
        })))
        .mount(&server)
        .await;

    let err = app.auth.login("kasia", "wrong").await.unwrap_err();

    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(
        app.auth.state(),
        AuthState::Error {
            message: "Unable to log in with provided credentials.".to_string(),
            user: None
        }
    );
    assert!(!app.store().has_credentials());

    app.auth.clear_error();
    assert_eq!(app.auth.state(), AuthState::Unauthenticated);
}

#[test_log::test(tokio::test)]
async fn test_credential_endpoint_401_is_final() {
    let (server, app) = common::setup().await;
    app.store().set_refresh("left-over");
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "unused"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = app.auth.login("kasia", "wrong").await.unwrap_err();
    assert_eq!(err.user_message(), "No active account found with the given credentials");
    assert_eq!(app.auth.state().error(), Some("No active account found with the given credentials"));
}

#[test_log::test(tokio::test)]
async fn test_registration_field_errors_from_backend() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["A user with that username already exists."],
            "email": ["user with this email already exists."]
        })))
        .mount(&server)
        .await;

    let request = RegisterRequest {
        username: "kasia".into(),
        email: "kasia@example.com".into(),
        first_name: "Kasia".into(),
        last_name: "Kowalska".into(),
        password: "Str0ng-pass".into(),
        password2: "Str0ng-pass".into(),
        phone_number: None,
    };
    let err = app.auth.register(request).await.unwrap_err();
    let errors = err.validation_errors().unwrap();

    assert_eq!(errors.field_messages("username"), ["A user with that username already exists."]);
    assert_eq!(errors.field_messages("email"), ["user with this email already exists."]);
    assert!(matches!(app.auth.state(), AuthState::Error { user: None, .. }));
}

#[test_log::test(tokio::test)]
async fn test_registration_checked_before_sending() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let request = RegisterRequest {
        username: "kasia".into(),
        email: "kasia@example.com".into(),
        first_name: "Kasia".into(),
        last_name: "Kowalska".into(),
        password: "Str0ng-pass".into(),
        password2: "other-pass".into(),
        phone_number: Some("600100200".into()),
    };
    let err = app.auth.register(request).await.unwrap_err();
    let errors = err.validation_errors().unwrap();

    assert_eq!(errors.field_messages("password"), ["Password fields didn't match."]);
    assert_eq!(
        errors.field_messages("phone_number"),
        ["Phone number must start with country code (e.g., +48)"]
    );
}

#[test_log::test(tokio::test)]
async fn test_initialize_without_session() {
    let (_server, app) = common::setup().await;
    assert_eq!(app.auth.initialize().await, AuthState::Unauthenticated);
}

#[test_log::test(tokio::test)]
async fn test_initialize_restores_valid_session() {
    let (server, app) = common::setup().await;
    let token = common::access_token(30);
    app.store().set_access(&token);
    app.store().set_refresh("refresh-1");
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::user_json("kasia")))
        .mount(&server)
        .await;

    let state = app.auth.initialize().await;
    assert!(state.is_authenticated());
    assert_eq!(state.user().unwrap().username, "kasia");
    assert!(app.store().has_valid_session(chrono::Utc::now()));
}

#[test_log::test(tokio::test)]
async fn test_initialize_with_rejected_session_clears_storage() {
    let (server, app) = common::setup().await;
    app.store().set_access("expired-access");
    app.store().set_refresh("revoked-refresh");
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(app.auth.initialize().await, AuthState::Unauthenticated);
    assert!(!app.store().has_credentials());
}

#[test_log::test(tokio::test)]
async fn test_logout_clears_session_even_if_server_fails() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(login_response("access-1", "refresh-1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(body_json(json!({"refresh": "refresh-1"})))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    app.auth.login("kasia", "Str0ng-pass").await.unwrap();
    let mut events = app.client().subscribe();
    app.auth.logout().await;

    assert_eq!(app.auth.state(), AuthState::Unauthenticated);
    assert!(app.store().access().is_none());
    assert!(app.store().refresh().is_none());
    assert!(app.store().user().is_none());
    assert!(events.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_logout_with_rejected_token_does_not_refresh() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(login_response("expired-access", "refresh-1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})))
        .expect(0)
        .mount(&server)
        .await;

    app.auth.login("kasia", "Str0ng-pass").await.unwrap();
    let mut events = app.client().subscribe();
    app.auth.logout().await;

    assert_eq!(app.auth.state(), AuthState::Unauthenticated);
    assert!(!app.store().has_credentials());
    assert!(events.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_forced_logout_reaches_auth_state() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(login_response("access-1", "refresh-1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/preferences/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid or expired"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})))
        .mount(&server)
        .await;

    let listener = app.auth.spawn_logout_listener();
    app.auth.login("kasia", "Str0ng-pass").await.unwrap();
    let mut states = app.auth.watch();

    let err = app
        .client()
        .send::<serde_json::Value>(ApiRequest::get(endpoints::PREFERENCES))
        .await
        .unwrap_err();
    assert!(err.is_session_expired());

    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| *s == AuthState::Unauthenticated))
        .await
        .expect("listener did not log out")
        .unwrap();
    listener.abort();
}

#[test_log::test(tokio::test)]
async fn test_preference_update_refreshes_cached_user() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(login_response("access-1", "refresh-1"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/auth/preferences/"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(json!({"alert_radius": 50})))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::profile_json(50)))
        .expect(1)
        .mount(&server)
        .await;

    app.auth.login("kasia", "Str0ng-pass").await.unwrap();
    let update = PreferencesUpdate {
        alert_radius: Some(50),
        ..Default::default()
    };
    let profile = app.auth.update_preferences(update).await.unwrap();

    assert_eq!(profile.alert_radius, 50);
    let cached: User = app.store().user().unwrap();
    assert_eq!(cached.profile.unwrap().alert_radius, 50);
    assert_eq!(
        app.auth.state().user().and_then(|u| u.profile.as_ref()).map(|p| p.alert_radius),
        Some(50)
    );
}

#[test_log::test(tokio::test)]
async fn test_failed_password_change_keeps_user() {
    let (server, app) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(login_response("access-1", "refresh-1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/change-password/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "old_password": ["Old password is not correct."]
        })))
        .mount(&server)
        .await;

    let user = app.auth.login("kasia", "Str0ng-pass").await.unwrap();
    let err = app
        .auth
        .change_password(ChangePasswordRequest {
            old_password: "wrong".into(),
            new_password: "N3w-pass".into(),
            new_password2: "N3w-pass".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "old_password: Old password is not correct.");
    assert_eq!(app.auth.state().user(), Some(&user));
    app.auth.clear_error();
    assert_eq!(app.auth.state(), AuthState::Authenticated(user));
}

#[test]
fn test_session_keys_are_namespaced() {
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
        assert!(key.starts_with("safenow."));
    }
}
