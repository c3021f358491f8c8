/*
 * Responsibility
 * - Shared, read-only context attached to the Router (AppState)
 * - Clone is cheap: everything sits behind Arc
 * - Nothing per-request lives here; see RequestContext for that
 */
use std::sync::Arc;

use crate::config::AuthPolicyConfig;
use crate::services::auth::clock::Clock;
use crate::services::auth::factory::{build_policy, build_token_service};
use crate::services::auth::policy::{AuthorizationPolicy, PolicyError};
use crate::services::auth::{CredentialVerifier, RoleLookup, TokenService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthPolicyConfig>,
    pub tokens: Arc<TokenService>,
    pub policy: Arc<AuthorizationPolicy>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub roles: Arc<dyn RoleLookup>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("policy", &self.policy)
            .finish()
    }
}

impl AppState {
    pub fn new(
        config: AuthPolicyConfig,
        clock: Arc<dyn Clock>,
        credentials: Arc<dyn CredentialVerifier>,
        roles: Arc<dyn RoleLookup>,
    ) -> Result<Self, PolicyError> {
        let policy = build_policy(&config)?;
        let tokens = build_token_service(&config, clock);

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            policy: Arc::new(policy),
            credentials,
            roles,
        })
    }
}
