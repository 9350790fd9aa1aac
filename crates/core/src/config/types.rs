use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub qr: QrConfig,
    /// End-user login. Without it `/login` and `/my-tickets` are unavailable.
    #[serde(default)]
    pub oidc: Option<OidcConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL ticket links are built from (default: http://localhost:<port>)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Directory of static assets served before the 404 fallback
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Base URL without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            static_dir: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

/// Authentication configuration for the admin (machine-to-machine) endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared secret, required when method = "api_key"
    #[serde(default)]
    pub api_key: Option<String>,
    /// Token verification settings, required when method = "jwt"
    #[serde(default)]
    pub jwt: Option<JwtConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
    Jwt,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::Jwt => "jwt",
        }
    }
}

/// Bearer token verification against a published key set
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JwtConfig {
    /// URL of the JSON Web Key Set
    pub jwks_uri: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
}

fn default_algorithm() -> Algorithm {
    Algorithm::RS256
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("lotto.db")
}

/// QR code rendering
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrConfig {
    /// Minimum width of the rendered image in pixels
    #[serde(default = "default_qr_size")]
    pub size: u32,
    /// Quiet zone around the code, in modules
    #[serde(default = "default_qr_margin")]
    pub margin: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size: default_qr_size(),
            margin: default_qr_margin(),
        }
    }
}

fn default_qr_size() -> u32 {
    360
}

fn default_qr_margin() -> u32 {
    1
}

/// OpenID Connect login for end users (authorization code flow)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OidcConfig {
    /// Issuer base URL, e.g. "https://tenant.eu.auth0.com/"
    pub issuer_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Signing algorithm of ID tokens
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// Endpoint overrides; derived from the issuer when absent
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl OidcConfig {
    fn issuer_root(&self) -> &str {
        self.issuer_base_url.trim_end_matches('/')
    }

    /// Issuer as it appears in the `iss` claim (with trailing slash).
    pub fn issuer(&self) -> String {
        format!("{}/", self.issuer_root())
    }

    pub fn authorization_endpoint(&self) -> String {
        self.authorization_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/authorize", self.issuer_root()))
    }

    pub fn token_endpoint(&self) -> String {
        self.token_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/token", self.issuer_root()))
    }

    pub fn end_session_endpoint(&self) -> String {
        self.end_session_endpoint
            .clone()
            .unwrap_or_else(|| format!("{}/v2/logout", self.issuer_root()))
    }

    pub fn jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", self.issuer_root()))
    }
}

fn default_scope() -> String {
    "openid profile email".to_string()
}

fn default_session_ttl_hours() -> i64 {
    24
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub qr: QrConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc: Option<SanitizedOidcConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtConfig>,
}

/// Sanitized OIDC config (client secret hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedOidcConfig {
    pub issuer_base_url: String,
    pub client_id: String,
    pub client_secret_configured: bool,
    pub scope: String,
    pub session_ttl_hours: i64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
                api_key_configured: config
                    .auth
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                jwt: config.auth.jwt.clone(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            qr: config.qr.clone(),
            oidc: config.oidc.as_ref().map(|o| SanitizedOidcConfig {
                issuer_base_url: o.issuer_base_url.clone(),
                client_id: o.client_id.clone(),
                client_secret_configured: !o.client_secret.is_empty(),
                scope: o.scope.clone(),
                session_ttl_hours: o.session_ttl_hours,
            }),
        }
    }
}
