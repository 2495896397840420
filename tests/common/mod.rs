#![allow(dead_code)]

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use safenow_client::{SafeNowClient, Settings};
use serde_json::{json, Value};
use wiremock::MockServer;

pub async fn setup() -> (MockServer, SafeNowClient) {
    let server = MockServer::start().await;
    let config = Settings::for_base_url(&format!("{}/api", server.uri())).expect("Failed to build test config");
    let app = SafeNowClient::new(config).expect("Failed to create client");
    (server, app)
}

pub fn user_json(username: &str) -> Value {
    json!({
        "id": 1,
        "username": username,
        "email": format!("{}@example.com", username),
        "first_name": "Kasia",
        "last_name": "Kowalska",
        "phone_number": "+48123456789",
        "role": "USER",
        "is_verified": true,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z",
        "profile": profile_json(10)
    })
}

pub fn profile_json(alert_radius: u32) -> Value {
    json!({
        "preferred_language": "pl",
        "email_notifications": true,
        "push_notifications": true,
        "sms_notifications": false,
        "auto_location": true,
        "alert_radius": alert_radius
    })
}

/// Unsigned-looking JWT whose `exp` is `minutes` from now (negative for expired).
pub fn access_token(minutes: i64) -> String {
    let claims = json!({
        "token_type": "access",
        "exp": (Utc::now() + Duration::minutes(minutes)).timestamp(),
        "iat": Utc::now().timestamp(),
        "user_id": 1
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"backend-secret")).expect("Failed to mint token")
}
