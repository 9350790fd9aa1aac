//! Admin endpoint authentication through the full router.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{AdminAuth, TestConfig, TestFixture};
use lotto_core::testing::jwks;
use serde_json::json;

async fn jwt_fixture() -> TestFixture {
    TestFixture::with_config(TestConfig {
        auth: AdminAuth::Jwt,
        ..Default::default()
    })
    .await
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let fixture = jwt_fixture().await;

    for path in ["/new-round", "/close"] {
        let response = fixture.post_admin(path, None).await;
        assert_status!(response, StatusCode::UNAUTHORIZED);
        assert!(response.json()["error"].is_string());
    }

    let response = fixture
        .post_json("/store-results", json!({ "numbers": [1] }), None)
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);

    let response = fixture.get("/api/v1/audit").await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_is_accepted_and_recorded() {
    let fixture = jwt_fixture().await;
    let token = jwks::admin_token();

    let response = fixture.post_admin("/new-round", Some(&token)).await;
    assert_status!(response, StatusCode::NO_CONTENT);
    let response = fixture.post_admin("/close", Some(&token)).await;
    assert_status!(response, StatusCode::NO_CONTENT);
    let response = fixture
        .post_json("/store-results", json!({ "numbers": [3, 1, 2] }), Some(&token))
        .await;
    assert_status!(response, StatusCode::NO_CONTENT);

    fixture.wait_for_audit("draw_published", 1).await;
    let response = fixture
        .get_authorized("/api/v1/audit?event_type=round_opened", &token)
        .await;
    assert_status!(response, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["events"][0]["data"]["opened_by"], "scheduler@clients");
    assert_eq!(body["events"][0]["user_id"], "scheduler@clients");
}

#[tokio::test]
async fn test_invalid_tokens_are_rejected() {
    let fixture = jwt_fixture().await;
    let exp = Utc::now().timestamp() + 3600;

    let wrong_audience = jwks::sign_token(&json!({
        "sub": "scheduler@clients",
        "iss": jwks::TEST_ISSUER,
        "aud": "https://someone-else/",
        "exp": exp,
    }));
    let wrong_issuer = jwks::sign_token(&json!({
        "sub": "scheduler@clients",
        "iss": "https://evil.test/",
        "aud": jwks::TEST_AUDIENCE,
        "exp": exp,
    }));
    let expired = jwks::sign_token(&json!({
        "sub": "scheduler@clients",
        "iss": jwks::TEST_ISSUER,
        "aud": jwks::TEST_AUDIENCE,
        "exp": Utc::now().timestamp() - 3600,
    }));

    for token in [wrong_audience, wrong_issuer, expired, "not-a-jwt".to_string()] {
        let response = fixture.post_admin("/new-round", Some(&token)).await;
        assert_status!(response, StatusCode::UNAUTHORIZED);
    }

    // Nothing was opened
    let response = fixture.submit_form("12345678", "1,2,3,4,5,6", None).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_key_auth() {
    let fixture = TestFixture::with_config(TestConfig {
        auth: AdminAuth::ApiKey("letmein".to_string()),
        ..Default::default()
    })
    .await;

    assert_status!(
        fixture.post_admin("/new-round", Some("wrong")).await,
        StatusCode::UNAUTHORIZED
    );
    assert_status!(
        fixture.post_admin("/new-round", Some("letmein")).await,
        StatusCode::NO_CONTENT
    );

    let config = fixture.get("/api/v1/config").await.json();
    assert_eq!(config["auth"]["method"], "api_key");
    assert_eq!(config["auth"]["api_key_configured"], true);
    assert!(!config.to_string().contains("letmein"));
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let fixture = jwt_fixture().await;

    assert_status!(fixture.get("/").await, StatusCode::OK);
    assert_status!(fixture.get("/api/v1/health").await, StatusCode::OK);
    assert_status!(fixture.get("/api/v1/config").await, StatusCode::OK);
    assert_status!(fixture.get("/metrics").await, StatusCode::OK);
}
