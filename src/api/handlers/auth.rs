/*
 * Responsibility
 * - login: credentials -> token
 * - refresh: header token (expired is fine) -> new token
 * - me: current principal
 */
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use tracing::{info, warn};

use crate::api::dto::{LoginRequest, MeResponse, TokenResponse};
use crate::api::extractors::CurrentPrincipal;
use crate::error::AppError;
use crate::middleware::auth::access::extract_token;
use crate::services::auth::credentials::CredentialError;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    req.validate()
        .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

    let principal = state
        .credentials
        .verify(&req.username, &req.password)
        .await
        .map_err(|e| {
            if matches!(e, CredentialError::BadCredentials) {
                warn!(username = %req.username, "login rejected");
            }
            AppError::from(e)
        })?;

    let token = state.tokens.issue_for_user(principal.subject())?;
    info!(subject = %principal.subject(), "login succeeded");

    Ok(Json(TokenResponse {
        access_token: token.into_string(),
        expires_in: state.tokens.expires_in(),
    }))
}

/// Refresh is permit-all: the filter lets expired tokens through and the
/// token service decides.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    let token = extract_token(&headers, &state.config.header_name, &state.config.header_prefix)
        .ok_or(AppError::Unauthorized)?;

    let refreshed = state.tokens.refresh(token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::from(e)
    })?;

    Ok(Json(TokenResponse {
        access_token: refreshed.into_string(),
        expires_in: state.tokens.expires_in(),
    }))
}

pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<MeResponse> {
    Json(MeResponse {
        username: principal.subject().to_string(),
        roles: principal.roles().iter().cloned().collect(),
    })
}
