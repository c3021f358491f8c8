/// Factory: build token / policy services from `AuthPolicyConfig`.
use std::sync::Arc;

use crate::config::AuthPolicyConfig;
use crate::services::auth::clock::Clock;
use crate::services::auth::codec::TokenCodec;
use crate::services::auth::policy::{AuthorizationPolicy, PolicyError};
use crate::services::auth::token_service::TokenService;

pub fn build_token_service(config: &AuthPolicyConfig, clock: Arc<dyn Clock>) -> TokenService {
    TokenService::new(
        TokenCodec::new(&config.signing_secret),
        clock,
        config.token_ttl_seconds,
        config.refresh_window_seconds,
    )
}

/// Fails when a configured path pattern cannot be parsed.
pub fn build_policy(config: &AuthPolicyConfig) -> Result<AuthorizationPolicy, PolicyError> {
    AuthorizationPolicy::new(config.enabled, &config.base_path, &config.permit_all_paths)
}
