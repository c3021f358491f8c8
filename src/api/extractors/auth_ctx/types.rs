/*
 * Responsibility
 * - Per-request authentication context as seen by handlers
 * - The authentication filter builds it and stores it in request extensions;
 *   handlers receive it through extractors, never through global state
 */
use crate::services::auth::{InvalidReason, Principal};

/// How the filter resolved the caller. Kept for diagnostics; never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    NoToken,
    Expired,
    Invalid(InvalidReason),
    RoleLookupFailed,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Option<Principal>,
    token: Option<String>,
    outcome: AuthOutcome,
}

impl RequestContext {
    pub fn authenticated(principal: Principal, token: impl Into<String>) -> Self {
        Self {
            principal: Some(principal),
            token: Some(token.into()),
            outcome: AuthOutcome::Authenticated,
        }
    }

    /// Anonymous caller; `token` is whatever was presented, if anything.
    pub fn anonymous(token: Option<String>, outcome: AuthOutcome) -> Self {
        Self {
            principal: None,
            token,
            outcome,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn outcome(&self) -> AuthOutcome {
        self.outcome
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}
