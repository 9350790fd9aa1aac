//! Common test utilities for driving the router in-process.
//!
//! The fixture wires real SQLite stores in a temporary directory with a
//! mock QR encoder, so pages, admin calls and audit records can be checked
//! without starting a server.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use lotto_core::config::{AuthConfig, JwtConfig};
use lotto_core::testing::{fixtures, jwks, MockQrEncoder};
use lotto_core::{
    create_audit_system, ApiKeyAuthenticator, AuditFilter, AuditStore, AuthMethod, Authenticator,
    JwksVerifier, JwtAuthenticator, Lottery, NoneAuthenticator, OidcClient, OidcConfig,
    SessionStore, SqliteAuditStore, SqliteLotteryStore, SqliteSessionStore,
};
use lotto_server::{api::create_router, state::AppState};

/// Public URL the fixture's tickets link to.
pub const BASE_URL: &str = "http://lotto.test";

/// How admin endpoints authenticate in a fixture.
#[derive(Debug, Clone, Default)]
pub enum AdminAuth {
    #[default]
    None,
    ApiKey(String),
    /// HS256 tokens from `lotto_core::testing::jwks`
    Jwt,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub auth: AdminAuth,
    /// End-user login; ID tokens are checked against the test key set.
    pub oidc: Option<OidcConfig>,
    pub static_dir: Option<PathBuf>,
}

pub struct TestFixture {
    pub router: Router,
    pub qr: Arc<MockQrEncoder>,
    pub audit_store: Arc<SqliteAuditStore>,
    pub sessions: Arc<SqliteSessionStore>,
    /// Holds the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// `name=value` of the session cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("lotto_session="))
            .and_then(|v| v.split(';').next())
            .map(str::to_string)
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut config = fixtures::config();
        config.database.path = db_path.clone();
        config.server.base_url = Some(BASE_URL.to_string());
        config.server.static_dir = test_config.static_dir.clone();
        config.oidc = test_config.oidc.clone();

        let authenticator: Arc<dyn Authenticator> = match &test_config.auth {
            AdminAuth::None => Arc::new(NoneAuthenticator::new()),
            AdminAuth::ApiKey(key) => {
                config.auth = AuthConfig {
                    method: AuthMethod::ApiKey,
                    api_key: Some(key.clone()),
                    jwt: None,
                };
                Arc::new(ApiKeyAuthenticator::new(key.clone()))
            }
            AdminAuth::Jwt => {
                config.auth = AuthConfig {
                    method: AuthMethod::Jwt,
                    api_key: None,
                    jwt: Some(JwtConfig {
                        jwks_uri: jwks::UNREACHABLE_JWKS_URI.to_string(),
                        issuer: jwks::TEST_ISSUER.to_string(),
                        audience: jwks::TEST_AUDIENCE.to_string(),
                        algorithm: jwks::TEST_KEY_ALGORITHM,
                    }),
                };
                Arc::new(JwtAuthenticator::new(jwks::test_verifier()))
            }
        };

        let audit_store =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let sessions =
            Arc::new(SqliteSessionStore::new(&db_path).expect("Failed to create session store"));
        let lottery_store =
            Arc::new(SqliteLotteryStore::new(&db_path).expect("Failed to create lottery store"));
        let qr = Arc::new(MockQrEncoder::new());

        let (audit_handle, audit_writer) =
            create_audit_system(Arc::clone(&audit_store) as Arc<dyn AuditStore>, 100);
        tokio::spawn(audit_writer.run());

        let lottery = Lottery::new(lottery_store, qr.clone(), BASE_URL)
            .with_audit(audit_handle.clone());

        let oidc = test_config.oidc.as_ref().map(|oidc_config| {
            let verifier = JwksVerifier::new(
                jwks::UNREACHABLE_JWKS_URI,
                jwks::TEST_ISSUER,
                &oidc_config.client_id,
                jwks::TEST_KEY_ALGORITHM,
            )
            .with_key_set(jwks::test_key_set());
            OidcClient::with_verifier(oidc_config, BASE_URL, verifier)
        });

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            lottery,
            audit_handle,
            Arc::clone(&audit_store) as Arc<dyn AuditStore>,
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            oidc,
        ));

        Self {
            router: create_router(state),
            qr,
            audit_store,
            sessions,
            temp_dir,
        }
    }

    /// Database shared by every store of the fixture.
    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("test.db")
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().uri(path), Body::empty()).await
    }

    /// GET carrying a `name=value` cookie.
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> TestResponse {
        self.send(
            Request::builder().uri(path).header(header::COOKIE, cookie),
            Body::empty(),
        )
        .await
    }

    /// GET with a bearer token.
    pub async fn get_authorized(&self, path: &str, token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token)),
            Body::empty(),
        )
        .await
    }

    /// POST a JSON body, optionally with a bearer token.
    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder, Body::from(serde_json::to_vec(&body).unwrap()))
            .await
    }

    /// POST an admin endpoint without a body.
    pub async fn post_admin(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder, Body::empty()).await
    }

    /// POST a raw body with the given content type.
    pub async fn post_raw(&self, path: &str, body: &str, content_type: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, content_type),
            Body::from(body.to_string()),
        )
        .await
    }

    /// POST the ticket form, like a browser would.
    pub async fn submit_form(
        &self,
        id_number: &str,
        numbers: &str,
        cookie: Option<&str>,
    ) -> TestResponse {
        let body = format!(
            "idNumber={}&numbers={}",
            form_encode(id_number),
            form_encode(numbers)
        );
        let mut builder = Request::builder()
            .method("POST")
            .uri("/submit")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder, Body::from(body)).await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Open a round through the admin endpoint (no auth configured).
    pub async fn open_round(&self) {
        let response = self.post_admin("/new-round", None).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT, "{}", response.text());
    }

    pub async fn close_round(&self) {
        let response = self.post_admin("/close", None).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT, "{}", response.text());
    }

    /// Submit a ticket that must be accepted; returns its public link.
    pub async fn submit_ok(&self, id_number: &str, numbers: &str) -> String {
        let response = self.submit_form(id_number, numbers, None).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response
            .header("x-ticket-url")
            .expect("ticket link header")
            .to_string()
    }

    /// Wait until the audit writer has stored `count` events of a type.
    pub async fn wait_for_audit(&self, event_type: &str, count: i64) {
        let filter = AuditFilter::new().with_event_type(event_type);
        for _ in 0..100 {
            if self.audit_store.count(&filter).unwrap() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} {} audit event(s)", count, event_type);
    }
}

/// Path of a ticket link, relative to the fixture's base URL.
pub fn ticket_path(link: &str) -> &str {
    link.strip_prefix(BASE_URL).expect("link under base URL")
}

fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            b' ' => "+".to_string(),
            other => format!("%{:02X}", other),
        })
        .collect()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status,
            $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            $response.text()
        );
    };
}
