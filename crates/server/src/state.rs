use std::sync::Arc;

use lotto_core::{
    AuditHandle, AuditStore, Authenticator, Config, Lottery, OidcClient, SanitizedConfig,
    SessionStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    lottery: Lottery,
    audit: AuditHandle,
    audit_store: Arc<dyn AuditStore>,
    sessions: Arc<dyn SessionStore>,
    oidc: Option<OidcClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        lottery: Lottery,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        sessions: Arc<dyn SessionStore>,
        oidc: Option<OidcClient>,
    ) -> Self {
        Self {
            config,
            authenticator,
            lottery,
            audit,
            audit_store,
            sessions,
            oidc,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Public URL of this service, without a trailing slash.
    pub fn base_url(&self) -> String {
        self.config.server.public_base_url()
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn lottery(&self) -> &Lottery {
        &self.lottery
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// `None` when end-user login is not configured.
    pub fn oidc(&self) -> Option<&OidcClient> {
        self.oidc.as_ref()
    }
}
