use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - The selected auth method has its settings
/// - OIDC settings are complete when present
/// - QR size is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    match config.auth.method {
        AuthMethod::None => {}
        AuthMethod::ApiKey => {
            if config.auth.api_key.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::ValidationError(
                    "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
                ));
            }
        }
        AuthMethod::Jwt => {
            let jwt = config.auth.jwt.as_ref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "[auth.jwt] must be set when auth.method = \"jwt\"".to_string(),
                )
            })?;
            for (name, value) in [
                ("auth.jwt.jwks_uri", &jwt.jwks_uri),
                ("auth.jwt.issuer", &jwt.issuer),
                ("auth.jwt.audience", &jwt.audience),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{} cannot be empty",
                        name
                    )));
                }
            }
        }
    }

    if let Some(oidc) = &config.oidc {
        for (name, value) in [
            ("oidc.issuer_base_url", &oidc.issuer_base_url),
            ("oidc.client_id", &oidc.client_id),
            ("oidc.client_secret", &oidc.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }
        if oidc.session_ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "oidc.session_ttl_hours must be positive".to_string(),
            ));
        }
    }

    if config.qr.size == 0 {
        return Err(ConfigError::ValidationError(
            "qr.size cannot be 0".to_string(),
        ));
    }

    Ok(())
}
