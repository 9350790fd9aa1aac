mod api_key;
mod authenticator;
mod jwt;
mod types;

pub use api_key::*;
pub use authenticator::*;
pub use jwt::*;
pub use types::*;

use crate::config::AuthConfig;

/// Factory function to create the admin authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "api_key must be set when using ApiKey auth method".to_string(),
                )
            })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
        AuthMethod::Jwt => {
            let jwt = config.jwt.as_ref().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "[auth.jwt] must be set when using Jwt auth method".to_string(),
                )
            })?;
            Ok(Box::new(JwtAuthenticator::new(JwksVerifier::from_config(jwt))))
        }
    }
}
