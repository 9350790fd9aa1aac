//! Symmetric signing keys published as a JWKS, for exercising token checks
//! without an identity provider.

use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;

use crate::auth::JwksVerifier;

pub const TEST_ISSUER: &str = "https://issuer.test/";
pub const TEST_AUDIENCE: &str = "https://lotto.test/admin";
pub const TEST_KEY_ID: &str = "test-key";
pub const TEST_KEY_ALGORITHM: Algorithm = Algorithm::HS256;
/// Nowhere listens here; fetching from it fails fast.
pub const UNREACHABLE_JWKS_URI: &str = "http://127.0.0.1:9/jwks.json";

const SECRET: &[u8] = b"lotto-test-signing-secret-0000001";
/// `SECRET`, base64 encoded (valid with and without the URL-safe alphabet).
const SECRET_B64: &str = "bG90dG8tdGVzdC1zaWduaW5nLXNlY3JldC0wMDAwMDAx";

/// Key set holding the test signing key.
pub fn test_key_set() -> JwkSet {
    let set = json!({
        "keys": [{
            "kty": "oct",
            "kid": TEST_KEY_ID,
            "alg": "HS256",
            "k": SECRET_B64,
        }]
    });
    serde_json::from_value(set).expect("static key set is valid")
}

/// Verifier for `TEST_ISSUER`/`TEST_AUDIENCE` with the key set preloaded.
pub fn test_verifier() -> JwksVerifier {
    JwksVerifier::new(
        UNREACHABLE_JWKS_URI,
        TEST_ISSUER,
        TEST_AUDIENCE,
        TEST_KEY_ALGORITHM,
    )
    .with_key_set(test_key_set())
}

/// Sign arbitrary claims with the test key.
pub fn sign_token(claims: &serde_json::Value) -> String {
    sign_token_with_kid(claims, TEST_KEY_ID)
}

/// Sign with the test key but announce another key id in the header.
pub fn sign_token_with_kid(claims: &serde_json::Value, kid: &str) -> String {
    let mut header = Header::new(TEST_KEY_ALGORITHM);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(SECRET)).expect("test token signs")
}

/// A valid admin token, good for an hour.
pub fn admin_token() -> String {
    sign_token(&json!({
        "sub": "scheduler@clients",
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "exp": Utc::now().timestamp() + 3600,
    }))
}
