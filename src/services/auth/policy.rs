/*
 * Responsibility
 * - Which request paths require a valid token (base path + permit-all list)
 * - Two-state decision: bypass or require authentication
 * - Role requirements are NOT decided here; resources call Principal::require_role
 */
use thiserror::Error;

use crate::services::auth::principal::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
}

/// Ant-style path pattern, restricted to a wildcard in the final segment.
///
/// - `/health`       exact match
/// - `/api/auth/*`   one more segment below `/api/auth`
/// - `/api/**`       `/api` itself and anything below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    SingleSegment(String),
    AnyDepth(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PolicyError> {
        let invalid = |reason| PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let (parsed, prefix) = if let Some(prefix) = pattern.strip_suffix("/**") {
            (Self::AnyDepth(prefix.to_string()), prefix)
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            (Self::SingleSegment(prefix.to_string()), prefix)
        } else {
            (Self::Exact(pattern.to_string()), pattern)
        };

        if prefix.contains('*') {
            return Err(invalid("wildcards are only allowed as the last segment"));
        }

        Ok(parsed)
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(p) => path == p,
            Self::SingleSegment(prefix) => path
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|segment| !segment.contains('/')),
            Self::AnyDepth(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    enabled: bool,
    base_path: PathPattern,
    permit_all: Vec<PathPattern>,
}

impl AuthorizationPolicy {
    pub fn new<S: AsRef<str>>(
        enabled: bool,
        base_path: &str,
        permit_all: &[S],
    ) -> Result<Self, PolicyError> {
        let base_path = PathPattern::parse(base_path)?;
        let permit_all = permit_all
            .iter()
            .map(|p| PathPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enabled,
            base_path,
            permit_all,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `path` falls under the protected base path at all.
    pub fn is_protected(&self, path: &str) -> bool {
        self.enabled && self.base_path.matches(path)
    }

    pub fn is_permit_all(&self, path: &str) -> bool {
        self.permit_all.iter().any(|p| p.matches(path))
    }

    pub fn decide(&self, path: &str, principal: Option<&Principal>) -> Decision {
        if !self.is_protected(path) || self.is_permit_all(path) {
            return Decision::Allow;
        }

        match principal {
            Some(_) => Decision::Allow,
            None => Decision::Deny(DenyReason::Unauthenticated),
        }
    }
}
