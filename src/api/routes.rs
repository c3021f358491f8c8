/*
 * Responsibility
 * - URL layout; auth endpoint paths come from AuthPolicyConfig
 * - Which routes need a token is decided by AuthorizationPolicy, not here
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{admin, auth, health::health};
use crate::config::AuthPolicyConfig;
use crate::state::AppState;

pub const ADMIN_STATUS_PATH: &str = "/api/admin/status";

pub fn routes(config: &AuthPolicyConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(&config.login_path, post(auth::login))
        .route(&config.refresh_path, post(auth::refresh))
        .route(&config.me_path, get(auth::me))
        .route(ADMIN_STATUS_PATH, get(admin::status))
}
