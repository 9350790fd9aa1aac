use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Token from an `Authorization: Bearer <token>` header, if present.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.headers.get("authorization")?;
        value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Authenticated caller of the admin endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub claims: HashMap<String, serde_json::Value>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            claims: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: &str) -> AuthRequest {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), value.to_string());
        AuthRequest {
            headers,
            source_ip: "127.0.0.1".parse().unwrap(),
        }
    }

    #[test]
    fn test_anonymous_identity() {
        let identity = Identity::anonymous();
        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert!(identity.claims.is_empty());
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(request_with_auth("Bearer abc").bearer_token(), Some("abc"));
        assert_eq!(request_with_auth("bearer abc").bearer_token(), Some("abc"));
        assert_eq!(request_with_auth("Bearer ").bearer_token(), None);
        assert_eq!(request_with_auth("Basic abc").bearer_token(), None);
    }

    #[test]
    fn test_identity_serialization() {
        let identity = Identity {
            user_id: "scheduler@clients".to_string(),
            method: "jwt".to_string(),
            claims: {
                let mut map = HashMap::new();
                map.insert("scope".to_string(), serde_json::json!("rounds:write"));
                map
            },
        };

        let json = serde_json::to_string(&identity).unwrap();
        let deserialized: Identity = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.user_id, "scheduler@clients");
        assert_eq!(
            deserialized.claims.get("scope"),
            Some(&serde_json::json!("rounds:write"))
        );
    }
}
