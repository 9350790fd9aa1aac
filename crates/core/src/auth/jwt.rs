//! Bearer token authentication against a published JSON Web Key Set.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::config::JwtConfig;

/// Claims of a verified token, keyed by claim name.
pub type Claims = HashMap<String, serde_json::Value>;

/// Minimum time between two fetches of the key set.
pub const KEY_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Default)]
struct KeyCache {
    keys: Option<JwkSet>,
    /// Last fetch attempt, successful or not
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.as_ref().and_then(|set| set.find(kid))
    }

    fn cooling_down(&self, cooldown: Duration) -> bool {
        self.fetched_at.is_some_and(|at| at.elapsed() < cooldown)
    }
}

/// Verifies signed tokens with keys from a JWKS endpoint.
///
/// The key set is cached after the first fetch and fetched again when a
/// token names a key id the cache does not know (key rotation), at most
/// once per refresh cooldown.
pub struct JwksVerifier {
    jwks_uri: String,
    issuer: String,
    audience: String,
    algorithm: Algorithm,
    http: reqwest::Client,
    cache: RwLock<KeyCache>,
    refresh_cooldown: Duration,
}

impl JwksVerifier {
    pub fn new(
        jwks_uri: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            algorithm,
            http: reqwest::Client::new(),
            cache: RwLock::new(KeyCache::default()),
            refresh_cooldown: KEY_REFRESH_COOLDOWN,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(
            &config.jwks_uri,
            &config.issuer,
            &config.audience,
            config.algorithm,
        )
    }

    /// Seed the key cache, skipping the first fetch.
    pub fn with_key_set(self, keys: JwkSet) -> Self {
        Self {
            cache: RwLock::new(KeyCache {
                keys: Some(keys),
                fetched_at: None,
            }),
            ..self
        }
    }

    pub fn with_refresh_cooldown(self, refresh_cooldown: Duration) -> Self {
        Self {
            refresh_cooldown,
            ..self
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        debug!(jwks_uri = %self.jwks_uri, "Fetching signing keys");
        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::ServiceUnavailable(format!("key set fetch failed: {}", e)))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(format!("invalid key set: {}", e)))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(jwk) = self.cache.read().await.find(kid) {
            return to_decoding_key(jwk);
        }

        // Fetches are serialized; a caller that waited here may find the key
        // already loaded by the one before it.
        let mut cache = self.cache.write().await;
        if let Some(jwk) = cache.find(kid) {
            return to_decoding_key(jwk);
        }
        if cache.cooling_down(self.refresh_cooldown) {
            debug!(kid, "Unknown key id during refresh cooldown");
            return match cache.keys {
                Some(_) => Err(AuthError::InvalidCredentials(format!(
                    "unknown signing key: {}",
                    kid
                ))),
                None => Err(AuthError::ServiceUnavailable(
                    "key set unavailable".to_string(),
                )),
            };
        }

        cache.fetched_at = Some(Instant::now());
        let fresh = self.fetch_keys().await?;
        info!(keys = fresh.keys.len(), "Signing key set refreshed");
        cache.keys = Some(fresh);

        match cache.find(kid) {
            Some(jwk) => to_decoding_key(jwk),
            None => Err(AuthError::InvalidCredentials(format!(
                "unknown signing key: {}",
                kid
            ))),
        }
    }

    /// Verify signature, issuer, audience and expiry, returning the claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_for_audience(token, &self.audience).await
    }

    /// Same as [`verify`](Self::verify) with a different expected audience.
    pub async fn verify_for_audience(
        &self,
        token: &str,
        audience: &str,
    ) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidCredentials(format!("malformed token: {}", e)))?;
        if header.alg != self.algorithm {
            return Err(AuthError::InvalidCredentials(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidCredentials("token has no key id".to_string()))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;
        Ok(data.claims)
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    DecodingKey::from_jwk(jwk)
        .map_err(|e| AuthError::InvalidCredentials(format!("unusable key: {}", e)))
}

/// Authenticator for machine-to-machine bearer tokens.
pub struct JwtAuthenticator {
    verifier: JwksVerifier,
}

impl JwtAuthenticator {
    pub fn new(verifier: JwksVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = request.bearer_token().ok_or(AuthError::NotAuthenticated)?;
        let claims = self.verifier.verify(token).await?;

        let user_id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Identity {
            user_id,
            method: "jwt".to_string(),
            claims,
        })
    }

    fn method_name(&self) -> &'static str {
        "jwt"
    }
}
