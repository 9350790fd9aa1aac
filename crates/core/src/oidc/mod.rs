//! OpenID Connect authorization-code login for end users.

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{AuthError, Claims, JwksVerifier};
use crate::config::OidcConfig;
use crate::session::{LoginState, UserProfile};

/// How long a login attempt may take between redirect and callback.
pub const LOGIN_STATE_MAX_AGE_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum OidcError {
    /// Token endpoint unreachable or answering with an error.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// ID token failed verification.
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    /// Signing keys could not be fetched.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for OidcError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ServiceUnavailable(msg) => OidcError::Unavailable(msg),
            other => OidcError::InvalidIdToken(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// Client for one identity provider tenant.
pub struct OidcClient {
    config: OidcConfig,
    redirect_uri: String,
    http: reqwest::Client,
    verifier: JwksVerifier,
}

impl OidcClient {
    /// `base_url` is the public URL of this service; the provider redirects
    /// back to `<base_url>/callback`.
    pub fn new(config: &OidcConfig, base_url: &str) -> Self {
        let verifier = JwksVerifier::new(
            config.jwks_uri(),
            config.issuer(),
            &config.client_id,
            config.algorithm,
        );
        Self::with_verifier(config, base_url, verifier)
    }

    pub fn with_verifier(config: &OidcConfig, base_url: &str, verifier: JwksVerifier) -> Self {
        Self {
            config: config.clone(),
            redirect_uri: format!("{}/callback", base_url.trim_end_matches('/')),
            http: reqwest::Client::new(),
            verifier,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.config.session_ttl_hours)
    }

    pub fn login_state_max_age(&self) -> Duration {
        Duration::minutes(LOGIN_STATE_MAX_AGE_MINUTES)
    }

    /// Where to send the browser to start a login.
    pub fn authorization_url(&self, login: &LoginState) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&nonce={}",
            self.config.authorization_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.config.scope),
            urlencoding::encode(&login.state),
            urlencoding::encode(&login.nonce),
        )
    }

    /// Provider logout, returning the browser to `return_to` afterwards.
    pub fn logout_url(&self, return_to: &str) -> String {
        format!(
            "{}?client_id={}&returnTo={}",
            self.config.end_session_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(return_to),
        )
    }

    /// Trade an authorization code for the user's verified profile.
    pub async fn exchange_code(
        &self,
        code: &str,
        login: &LoginState,
    ) -> Result<UserProfile, OidcError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        debug!(token_endpoint = %self.config.token_endpoint(), "Exchanging authorization code");
        let response = self
            .http
            .post(self.config.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| OidcError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token endpoint rejected the authorization code");
            return Err(OidcError::TokenExchange(format!("{}: {}", status, body)));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::TokenExchange(format!("unexpected response: {}", e)))?;

        self.verify_id_token(&tokens.id_token, &login.nonce).await
    }

    /// Verify an ID token and check it answers the login attempt with `nonce`.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        nonce: &str,
    ) -> Result<UserProfile, OidcError> {
        let claims = self.verifier.verify(id_token).await?;

        if claim_str(&claims, "nonce") != Some(nonce) {
            return Err(OidcError::InvalidIdToken("nonce mismatch".to_string()));
        }

        let sub = claim_str(&claims, "sub")
            .ok_or_else(|| OidcError::InvalidIdToken("missing sub claim".to_string()))?;

        Ok(UserProfile {
            sub: sub.to_string(),
            name: claim_str(&claims, "name").map(String::from),
            email: claim_str(&claims, "email").map(String::from),
        })
    }
}

fn claim_str<'a>(claims: &'a Claims, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::jwks::{sign_token, test_key_set, TEST_KEY_ALGORITHM};
    use chrono::Utc;
    use serde_json::json;

    const ISSUER: &str = "https://tenant.auth.example/";

    fn config() -> OidcConfig {
        OidcConfig {
            issuer_base_url: "https://tenant.auth.example".to_string(),
            client_id: "lotto web".to_string(),
            client_secret: "shh".to_string(),
            scope: "openid profile email".to_string(),
            session_ttl_hours: 12,
            algorithm: TEST_KEY_ALGORITHM,
            authorization_endpoint: None,
            token_endpoint: None,
            end_session_endpoint: None,
            jwks_uri: None,
        }
    }

    fn client() -> OidcClient {
        let config = config();
        let verifier = JwksVerifier::new(
            config.jwks_uri(),
            config.issuer(),
            &config.client_id,
            config.algorithm,
        )
        .with_key_set(test_key_set());
        OidcClient::with_verifier(&config, "https://lotto.example.com/", verifier)
    }

    fn login() -> LoginState {
        LoginState {
            state: "state-123".to_string(),
            nonce: "nonce-456".to_string(),
            created_at: Utc::now(),
        }
    }

    fn id_token(nonce: &str) -> String {
        sign_token(&json!({
            "sub": "auth0|user-1",
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "nonce": nonce,
            "iss": ISSUER,
            "aud": "lotto web",
            "exp": Utc::now().timestamp() + 600,
        }))
    }

    #[test]
    fn test_authorization_url() {
        let url = client().authorization_url(&login());
        assert!(url.starts_with("https://tenant.auth.example/authorize?response_type=code"));
        assert!(url.contains("client_id=lotto%20web"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Flotto.example.com%2Fcallback"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("nonce=nonce-456"));
    }

    #[test]
    fn test_logout_url() {
        let url = client().logout_url("https://lotto.example.com");
        assert_eq!(
            url,
            "https://tenant.auth.example/v2/logout?client_id=lotto%20web&returnTo=https%3A%2F%2Flotto.example.com"
        );
    }

    #[test]
    fn test_session_ttl_from_config() {
        assert_eq!(client().session_ttl(), Duration::hours(12));
    }

    #[tokio::test]
    async fn test_verify_id_token() {
        let profile = client()
            .verify_id_token(&id_token("nonce-456"), "nonce-456")
            .await
            .unwrap();
        assert_eq!(profile.sub, "auth0|user-1");
        assert_eq!(profile.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected() {
        let result = client()
            .verify_id_token(&id_token("replayed"), "nonce-456")
            .await;
        assert!(matches!(result, Err(OidcError::InvalidIdToken(_))));
    }

    #[tokio::test]
    async fn test_unreachable_token_endpoint() {
        let mut config = config();
        config.token_endpoint = Some("http://127.0.0.1:9/oauth/token".to_string());
        let client = OidcClient::new(&config, "https://lotto.example.com");

        let result = client.exchange_code("code", &login()).await;
        assert!(matches!(result, Err(OidcError::TokenExchange(_))));
    }
}
