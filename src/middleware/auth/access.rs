//! Authentication filter: token → principal → policy decision.
//!
//! One pass per request:
//! - extract the token from the configured header (prefix stripped)
//! - validate it and resolve roles (bounded by `role_lookup_timeout`)
//! - store the resulting `RequestContext` in request extensions
//! - ask `AuthorizationPolicy` whether the path may proceed
//!
//! Missing, expired and invalid tokens are ordinary outcomes: the caller is
//! treated as anonymous and the policy decides. Nothing here returns an error.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::api::extractors::{AuthOutcome, RequestContext};
use crate::error::AppError;
use crate::services::auth::{Decision, Principal, ValidationResult};
use crate::state::AppState;

/// Put the authentication filter in front of every route of `router`.
///
/// ```ignore
/// let router = api::routes(&state.config);
/// let router = middleware::auth::access::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // State is not available to plain `from_fn` middleware in axum 0.8.
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = authenticate(&state, req.headers()).await;

    match state.policy.decide(req.uri().path(), ctx.principal()) {
        Decision::Allow => {
            // picked up by the RequestContext / CurrentPrincipal extractors
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Decision::Deny(reason) => {
            debug!(
                path = %req.uri().path(),
                ?reason,
                outcome = ?ctx.outcome(),
                "request denied"
            );
            AppError::Unauthorized.into_response()
        }
    }
}

/// Resolve the caller of a request. Always produces a context.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let config = &state.config;
    let Some(token) = extract_token(headers, &config.header_name, &config.header_prefix) else {
        return RequestContext::anonymous(None, AuthOutcome::NoToken);
    };

    let subject = match state.tokens.validate(token) {
        ValidationResult::Valid(subject) => subject,
        ValidationResult::Expired => {
            debug!("token expired");
            return RequestContext::anonymous(Some(token.to_string()), AuthOutcome::Expired);
        }
        ValidationResult::Invalid(reason) => {
            warn!(?reason, "invalid token presented");
            return RequestContext::anonymous(
                Some(token.to_string()),
                AuthOutcome::Invalid(reason),
            );
        }
    };

    match tokio::time::timeout(config.role_lookup_timeout, state.roles.roles_for(&subject)).await
    {
        Ok(Ok(roles)) => RequestContext::authenticated(Principal::new(subject, roles), token),
        Ok(Err(e)) => {
            warn!(subject = %subject, error = %e, "role lookup failed");
            RequestContext::anonymous(Some(token.to_string()), AuthOutcome::RoleLookupFailed)
        }
        Err(_) => {
            warn!(
                subject = %subject,
                timeout_ms = config.role_lookup_timeout.as_millis() as u64,
                "role lookup timed out"
            );
            RequestContext::anonymous(Some(token.to_string()), AuthOutcome::RoleLookupFailed)
        }
    }
}

/// Token from `name`, with `prefix` (matched case-insensitively) removed.
///
/// A value without the prefix, or with nothing after it, counts as no token.
pub fn extract_token<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
    prefix: &str,
) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?;

    let scheme = value.get(..prefix.len())?;
    if !scheme.eq_ignore_ascii_case(prefix) {
        return None;
    }

    let token = value[prefix.len()..].trim();
    (!token.is_empty()).then_some(token)
}
