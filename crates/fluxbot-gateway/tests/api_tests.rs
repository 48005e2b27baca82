// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end API behavior through the router, with mock messaging backends.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use fluxbot_config::model::WhatsAppCloudConfig;
use fluxbot_core::types::{DeviceId, DeviceStatus, Direction, NewUser};
use fluxbot_core::{CloudMessenger, StorageAdapter, UserId, WhatsAppClientFactory};
use fluxbot_gateway::{AppState, GatewaySettings, Passwords, TokenSigner, build_router};
use fluxbot_session::{BotRegistry, DeviceSessionManager, SessionSettings};
use fluxbot_test_utils::{ClientBehavior, MockClientFactory, MockCloudMessenger, TestHarness};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;

struct TestApp {
    harness: TestHarness,
    app: Router,
    factory: Arc<MockClientFactory>,
    cloud: Arc<MockCloudMessenger>,
    sessions: Arc<DeviceSessionManager>,
    tokens: Arc<TokenSigner>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with(GatewaySettings::default(), ClientBehavior {
            ready_on_initialize: true,
            ..ClientBehavior::default()
        })
        .await
    }

    async fn with(settings: GatewaySettings, behavior: ClientBehavior) -> Self {
        let harness = TestHarness::new().await.unwrap();
        let factory = Arc::new(MockClientFactory::with_behavior(behavior));
        let cloud = Arc::new(MockCloudMessenger::new());
        let sessions = Arc::new(DeviceSessionManager::new(
            Arc::new(BotRegistry::new()),
            harness.storage_dyn(),
            Arc::clone(&factory) as Arc<dyn WhatsAppClientFactory>,
            SessionSettings {
                auth_dir: harness.config.session.auth_dir.clone().into(),
                connect_timeout: Duration::from_millis(500),
                stop_timeout: Duration::from_millis(500),
                send_timeout: Duration::from_millis(500),
            },
        ));
        let tokens = Arc::new(TokenSigner::new(
            SecretString::from("test-secret-0123456789".to_string()),
            7,
        ));
        let state = AppState {
            storage: harness.storage_dyn(),
            sessions: Arc::clone(&sessions),
            cloud: Arc::clone(&cloud) as Arc<dyn CloudMessenger>,
            tokens: Arc::clone(&tokens),
            passwords: Passwords::with_params(256, 1, 1).unwrap(),
            settings: Arc::new(settings),
        };
        let app = build_router(state, None).unwrap();
        Self {
            harness,
            app,
            factory,
            cloud,
            sessions,
            tokens,
        }
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.raw(request).await
    }

    /// Register a user and return its token.
    async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({"name": "Ana", "email": email, "password": "hunter22"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_device(&self, token: &str, platform: &str, config: Value) -> i64 {
        let (status, body) = self
            .call(
                Method::POST,
                "/devices",
                Some(token),
                Some(json!({"name": "Loja", "platform": platform, "config": config})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

// --- auth ---

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "Ana", "email": "ana@example.com", "password": "hunter22"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "hunter22"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["name"], "Ana");
}

#[tokio::test]
async fn register_validates_and_rejects_duplicates() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"email": "ana@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    app.register("ana@example.com").await;
    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "Other", "email": "ana@example.com", "password": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = TestApp::new().await;
    app.register("ana@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "hunter22"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::POST, "/auth/login", None, Some(json!({"email": "ana@example.com"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_require_valid_token() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/devices", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().is_some());

    let (status, _) = app
        .call(Method::GET, "/devices", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenSigner::new(SecretString::from("some-other-secret-value".to_string()), 7)
        .issue(UserId(1), Utc::now())
        .unwrap();
    let (status, _) = app
        .call(Method::GET, "/devices", Some(&foreign), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// --- health, dashboard, subscription ---

#[tokio::test]
async fn health_reports_database_time() {
    let app = TestApp::new().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["dbTime"].as_str().is_some());
}

#[tokio::test]
async fn subscription_starts_as_trial() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let (status, body) = app
        .call(Method::GET, "/subscription/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["status"], "trial");
    assert_eq!(body["subscription"]["plan_name"], "Free Trial");
}

#[tokio::test]
async fn lapsed_trial_reads_as_expired() {
    let app = TestApp::new().await;
    let user = app
        .harness
        .storage
        .create_user(
            &NewUser {
                name: "Late".into(),
                email: "late@example.com".into(),
                password_hash: "x".into(),
            },
            1,
            Utc::now() - chrono::Duration::days(1),
        )
        .await
        .unwrap();
    let token = app.tokens.issue(user.id, Utc::now()).unwrap();

    for _ in 0..2 {
        let (status, body) = app
            .call(Method::GET, "/subscription/me", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subscription"]["status"], "expired");
    }
}

#[tokio::test]
async fn subscription_missing_is_404() {
    let app = TestApp::new().await;
    let token = app.tokens.issue(UserId(999), Utc::now()).unwrap();
    let (status, _) = app
        .call(Method::GET, "/subscription/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_counts_connected_devices() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp_cloud", json!({})).await;
    app.call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;

    let (status, body) = app
        .call(Method::GET, "/dashboard/overview", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["devicesConnected"], 1);
    assert_eq!(body["messagesToday"], 0);
    assert_eq!(body["totalContacts"], 0);
}

// --- devices ---

#[tokio::test]
async fn cloud_device_lifecycle() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/devices",
            Some(&token),
            Some(json!({
                "name": "Loja",
                "platform": "whatsapp_cloud",
                "config": {"phoneNumberId": "1029", "accessToken": "EAAG-secret"}
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "disconnected");
    assert!(body.get("config").is_none());
    assert!(!body.to_string().contains("EAAG-secret"));
    let id = body["id"].as_i64().unwrap();

    let (status, body) = app
        .call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "connected");
    assert!(body["last_connected_at"].as_str().is_some());
    assert!(app.sessions.registry().is_empty());

    let (status, body) = app
        .call(Method::POST, &format!("/devices/{id}/disconnect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "disconnected");

    let (status, _) = app
        .call(Method::DELETE, &format!("/devices/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(Method::GET, &format!("/devices/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_platform_creates_nothing() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/devices",
            Some(&token),
            Some(json!({"name": "Pombo", "platform": "carrierpigeon"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("platform"));

    let (_, body) = app.call(Method::GET, "/devices", Some(&token), None).await;
    assert_eq!(body["devices"], json!([]));
}

#[tokio::test]
async fn list_is_newest_first_and_get_wraps_device() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let first = app.create_device(&token, "whatsapp", json!({})).await;
    let second = app.create_device(&token, "telegram", json!({})).await;

    let (status, body) = app.call(Method::GET, "/devices", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![second, first]);

    let (status, body) = app
        .call(Method::GET, &format!("/devices/{first}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["platform"], "whatsapp");
}

#[tokio::test]
async fn update_requires_a_change() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp", json!({})).await;

    let (status, _) = app
        .call(Method::PUT, &format!("/devices/{id}"), Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/devices/{id}"),
            Some(&token),
            Some(json!({"name": "Renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
}

#[tokio::test]
async fn malformed_ids_are_rejected() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    for uri in ["/devices/abc", "/devices/0", "/devices/-1/connect"] {
        let method = if uri.ends_with("connect") {
            Method::POST
        } else {
            Method::GET
        };
        let (status, _) = app.call(method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn other_users_devices_are_invisible() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com").await;
    let intruder = app.register("intruder@example.com").await;
    let id = app
        .create_device(&owner, "whatsapp_cloud", json!({"phoneNumberId": "1", "accessToken": "t"}))
        .await;

    let attempts = [
        (Method::GET, format!("/devices/{id}"), None),
        (Method::PUT, format!("/devices/{id}"), Some(json!({"name": "mine"}))),
        (Method::DELETE, format!("/devices/{id}"), None),
        (Method::POST, format!("/devices/{id}/connect"), None),
        (Method::POST, format!("/devices/{id}/disconnect"), None),
        (Method::GET, format!("/devices/{id}/messages"), None),
        (
            Method::POST,
            format!("/devices/{id}/send"),
            Some(json!({"to": "5511", "text": "hi"})),
        ),
        (
            Method::POST,
            "/whatsapp-cloud/send".to_string(),
            Some(json!({"deviceId": id, "to": "5511", "text": "hi"})),
        ),
    ];
    for (method, uri, body) in attempts {
        let (status, _) = app.call(method.clone(), &uri, Some(&intruder), body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
    }

    let (status, body) = app
        .call(Method::GET, &format!("/devices/{id}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["name"], "Loja");
    assert_eq!(body["device"]["status"], "disconnected");
    assert!(app.cloud.sent().is_empty());
}

#[tokio::test]
async fn telegram_connect_is_unsupported() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "telegram", json!({})).await;

    let (status, body) = app
        .call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unsupported platform"));

    let (_, body) = app
        .call(Method::GET, &format!("/devices/{id}"), Some(&token), None)
        .await;
    assert_eq!(body["device"]["status"], "error");
}

#[tokio::test]
async fn failed_initiation_is_502_and_recorded() {
    let app = TestApp::with(GatewaySettings::default(), ClientBehavior {
        fail_initialize: Some("bridge unreachable".into()),
        ..ClientBehavior::default()
    })
    .await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp", json!({})).await;

    let (status, _) = app
        .call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, body) = app
        .call(Method::GET, &format!("/devices/{id}"), Some(&token), None)
        .await;
    assert_eq!(body["device"]["status"], "error");
    assert!(body["device"]["last_error"]
        .as_str()
        .unwrap()
        .contains("bridge unreachable"));
}

#[tokio::test]
async fn initiation_timeout_is_504() {
    let app = TestApp::with(GatewaySettings::default(), ClientBehavior {
        initialize_delay: Some(Duration::from_secs(5)),
        ..ClientBehavior::default()
    })
    .await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp", json!({})).await;

    let (status, _) = app
        .call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn concurrent_connects_create_one_session() {
    let app = TestApp::with(GatewaySettings::default(), ClientBehavior {
        initialize_delay: Some(Duration::from_millis(50)),
        ready_on_initialize: true,
        ..ClientBehavior::default()
    })
    .await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp", json!({})).await;
    let uri = format!("/devices/{id}/connect");

    let (a, b) = tokio::join!(
        app.call(Method::POST, &uri, Some(&token), None),
        app.call(Method::POST, &uri, Some(&token), None),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(app.factory.total_initialize_calls(), 1);
    assert_eq!(app.sessions.registry().len(), 1);
}

#[tokio::test]
async fn live_session_send_requires_connection() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp", json!({})).await;
    let send_uri = format!("/devices/{id}/send");

    let (status, _) = app
        .call(Method::POST, &send_uri, Some(&token), Some(json!({"to": "5511"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            &send_uri,
            Some(&token),
            Some(json!({"to": "5511", "text": "oi"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(Method::POST, &format!("/devices/{id}/connect"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let device = app
        .harness
        .storage
        .get_device(app_user(&app, &token), DeviceId(id))
        .await
        .unwrap()
        .unwrap();
    app.harness
        .wait_for_status(&device, DeviceStatus::Connected, Duration::from_secs(2))
        .await
        .unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            &send_uri,
            Some(&token),
            Some(json!({"to": "5511", "text": "oi"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["messageId"], "mock-wamid-1");

    let (status, body) = app
        .call(Method::GET, &format!("/devices/{id}/messages"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["direction"], "outbound");
    assert_eq!(messages[0]["body"], "oi");
}

fn app_user(app: &TestApp, token: &str) -> UserId {
    app.tokens.verify(token, Utc::now()).unwrap()
}

// --- cloud send ---

#[tokio::test]
async fn cloud_send_persists_one_outbound_message() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app
        .create_device(&token, "whatsapp_cloud", json!({"phoneNumberId": "1029", "accessToken": "EAAG"}))
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": id, "to": "5511999990000", "text": "Olá"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["messageId"], "wamid.mock1");

    let sent = app.cloud.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].credentials.phone_number_id, "1029");
    assert_eq!(sent[0].credentials.access_token, "EAAG");

    let messages = app
        .harness
        .storage
        .list_messages(DeviceId(id), None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::Outbound);
    assert_eq!(messages[0].from_number, "1029");
    assert_eq!(messages[0].external_id.as_deref(), Some("wamid.mock1"));
}

#[tokio::test]
async fn cloud_rejection_is_relayed_and_nothing_persisted() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let id = app
        .create_device(&token, "whatsapp_cloud", json!({"phoneNumberId": "1029", "accessToken": "EAAG"}))
        .await;
    app.cloud.reject_with(401, "Invalid OAuth access token.");

    let (status, body) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": id.to_string(), "to": "5511", "text": "Olá"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid OAuth access token.");
    assert!(app
        .harness
        .storage
        .list_messages(DeviceId(id), None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cloud_send_falls_back_to_configured_credentials() {
    let settings = GatewaySettings {
        whatsapp_cloud: WhatsAppCloudConfig {
            phone_number_id: Some("9000".into()),
            access_token: Some("EAAG-default".into()),
            ..WhatsAppCloudConfig::default()
        },
        ..GatewaySettings::default()
    };
    let app = TestApp::with(settings, ClientBehavior::default()).await;
    let token = app.register("ana@example.com").await;
    let id = app.create_device(&token, "whatsapp_cloud", json!({})).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": id, "to": "5511", "text": "Olá"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.cloud.sent()[0].credentials.phone_number_id, "9000");
}

#[tokio::test]
async fn cloud_send_validates_input_and_config() {
    let app = TestApp::new().await;
    let token = app.register("ana@example.com").await;
    let unconfigured = app.create_device(&token, "whatsapp_cloud", json!({})).await;
    let web = app.create_device(&token, "whatsapp", json!({})).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": unconfigured, "to": "5511"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": unconfigured, "to": "5511", "text": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/whatsapp-cloud/send",
            Some(&token),
            Some(json!({"deviceId": web, "to": "5511", "text": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.cloud.sent().is_empty());
}

// --- webhook ---

fn webhook_settings() -> GatewaySettings {
    GatewaySettings {
        whatsapp_cloud: WhatsAppCloudConfig {
            webhook_verify_token: Some("verify-me".into()),
            app_secret: Some("app-secret".into()),
            ..WhatsAppCloudConfig::default()
        },
        ..GatewaySettings::default()
    }
}

fn webhook_payload(phone_number_id: &str) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{"id": "WABA", "changes": [{"field": "messages", "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550001111", "phone_number_id": phone_number_id},
            "messages": [{"from": "5511999990000", "id": "wamid.IN1", "type": "text", "text": {"body": "oi"}}]
        }}]}]
    })
}

fn signed_webhook(body: &str, secret: &str) -> Request<Body> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
    Request::builder()
        .method(Method::POST)
        .uri("/whatsapp-cloud/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-hub-signature-256", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn webhook_challenge() {
    let app = TestApp::with(webhook_settings(), ClientBehavior::default()).await;
    let (status, body) = app
        .call(
            Method::GET,
            "/whatsapp-cloud/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(1158201444));

    let (status, _) = app
        .call(
            Method::GET,
            "/whatsapp-cloud/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_webhook_stores_inbound_message() {
    let app = TestApp::with(webhook_settings(), ClientBehavior::default()).await;
    let token = app.register("ana@example.com").await;
    let id = app
        .create_device(&token, "whatsapp_cloud", json!({"phoneNumberId": "1029"}))
        .await;

    let body = webhook_payload("1029").to_string();
    let (status, _) = app.raw(signed_webhook(&body, "app-secret")).await;
    assert_eq!(status, StatusCode::OK);

    let messages = app
        .harness
        .storage
        .list_messages(DeviceId(id), None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::Inbound);
    assert_eq!(messages[0].from_number, "5511999990000");
    assert_eq!(messages[0].body, "oi");

    let (_, overview) = app
        .call(Method::GET, "/dashboard/overview", Some(&token), None)
        .await;
    assert_eq!(overview["messagesToday"], 1);
    assert_eq!(overview["totalContacts"], 1);
}

#[tokio::test]
async fn bad_signature_or_unknown_number_still_acknowledged() {
    let app = TestApp::with(webhook_settings(), ClientBehavior::default()).await;
    let token = app.register("ana@example.com").await;
    let id = app
        .create_device(&token, "whatsapp_cloud", json!({"phoneNumberId": "1029"}))
        .await;

    let body = webhook_payload("1029").to_string();
    let (status, _) = app.raw(signed_webhook(&body, "wrong-secret")).await;
    assert_eq!(status, StatusCode::OK);

    let unknown = webhook_payload("7777").to_string();
    let (status, _) = app.raw(signed_webhook(&unknown, "app-secret")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.raw(signed_webhook("not json", "app-secret")).await;
    assert_eq!(status, StatusCode::OK);

    assert!(app
        .harness
        .storage
        .list_messages(DeviceId(id), None)
        .await
        .unwrap()
        .is_empty());
}
