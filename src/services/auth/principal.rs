use std::collections::BTreeSet;

use thiserror::Error;

/// Authenticated identity plus its granted roles.
///
/// Built per request (or at login) and dropped with the request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    subject: String,
    roles: BTreeSet<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("subject {subject} lacks required role")]
pub struct AccessDenied {
    pub subject: String,
}

impl Principal {
    pub fn new<I, R>(subject: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Capability check for resource handlers.
    pub fn require_role(&self, role: &str) -> Result<(), AccessDenied> {
        self.require_any_role(&[role])
    }

    /// Passes when the principal holds at least one of `roles`.
    pub fn require_any_role(&self, roles: &[&str]) -> Result<(), AccessDenied> {
        if roles.iter().any(|r| self.has_role(r)) {
            Ok(())
        } else {
            Err(AccessDenied {
                subject: self.subject.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_checks() {
        let p = Principal::new("alice", ["ROLE_USER", "ROLE_ADMIN"]);

        assert!(p.require_role("ROLE_ADMIN").is_ok());
        assert!(p.require_any_role(&["ROLE_OPS", "ROLE_USER"]).is_ok());
        assert_eq!(
            p.require_role("ROLE_OPS"),
            Err(AccessDenied {
                subject: "alice".to_string()
            })
        );
    }

    #[test]
    fn empty_requirement_denies() {
        let p = Principal::new("alice", ["ROLE_USER"]);
        assert!(p.require_any_role(&[]).is_err());
    }
}
