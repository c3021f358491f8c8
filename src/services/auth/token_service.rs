use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::services::auth::clock::Clock;
use crate::services::auth::codec::{Token, TokenCodec, truncate_to_millis};
use crate::services::auth::error::{RefreshRejection, TokenError};

/// Why a presented token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    BadSignature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Signature ok and not expired; carries the subject.
    Valid(String),
    Expired,
    Invalid(InvalidReason),
}

/// Service that owns token lifetime policy.
///
/// - issue: new token for a freshly authenticated subject
/// - validate: signature + exact expiry boundary (no clock skew allowance)
/// - refresh: re-issue for the same subject while the refresh window is open
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    ttl_seconds: u64,
    refresh_window_seconds: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("refresh_window_seconds", &self.refresh_window_seconds)
            .finish()
    }
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        clock: Arc<dyn Clock>,
        ttl_seconds: u64,
        refresh_window_seconds: u64,
    ) -> Self {
        Self {
            codec,
            clock,
            ttl_seconds,
            refresh_window_seconds,
        }
    }

    /// Seconds a freshly issued token stays valid.
    pub fn expires_in(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn issue_for_user(&self, subject: &str) -> Result<Token, TokenError> {
        let token = self
            .codec
            .issue(subject, self.clock.now(), self.ttl_seconds)?;

        debug!(
            subject = %subject,
            expires_at = %token.expires_at(),
            "issued token"
        );

        Ok(token)
    }

    pub fn validate(&self, token: &str) -> ValidationResult {
        let decoded = match self.codec.decode(token) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return ValidationResult::Invalid(InvalidReason::Malformed);
            }
        };

        if !decoded.signature_valid {
            return ValidationResult::Invalid(InvalidReason::BadSignature);
        }

        // Same precision as the claims; a token never lives less than its TTL.
        if truncate_to_millis(self.clock.now()) > decoded.expires_at {
            return ValidationResult::Expired;
        }

        ValidationResult::Valid(decoded.subject)
    }

    /// Exchange a (possibly expired) token for a new one.
    ///
    /// The new token keeps the original `authenticated_at`, so the whole
    /// chain is bounded by the refresh window.
    pub fn refresh(&self, token: &str) -> Result<Token, TokenError> {
        let decoded = self
            .codec
            .decode(token)
            .map_err(|_| TokenError::RefreshRejected(RefreshRejection::Malformed))?;

        if !decoded.signature_valid {
            return Err(TokenError::RefreshRejected(RefreshRejection::BadSignature));
        }

        let now = truncate_to_millis(self.clock.now());
        let window = i64::try_from(self.refresh_window_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        if now - decoded.authenticated_at > window {
            debug!(
                subject = %decoded.subject,
                authenticated_at = %decoded.authenticated_at,
                "refresh window elapsed"
            );
            return Err(TokenError::RefreshRejected(RefreshRejection::WindowElapsed));
        }

        let refreshed = self.codec.issue_with_auth_time(
            &decoded.subject,
            now,
            decoded.authenticated_at,
            self.ttl_seconds,
        )?;

        debug!(
            subject = %decoded.subject,
            expires_at = %refreshed.expires_at(),
            "refreshed token"
        );

        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::clock::ManualClock;

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough-for-testing";
    const START: i64 = 1_700_000_000;

    fn service(ttl: u64, window: u64) -> (TokenService, Arc<ManualClock>) {
        service_at(START * 1000, ttl, window)
    }

    fn service_at(start_millis: i64, ttl: u64, window: u64) -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_timestamp_millis(start_millis));
        let service = TokenService::new(TokenCodec::new(SECRET), clock.clone(), ttl, window);
        (service, clock)
    }

    fn valid(subject: &str) -> ValidationResult {
        ValidationResult::Valid(subject.to_string())
    }

    #[test]
    fn validate_accepts_fresh_token() {
        let (svc, _) = service(3600, 86400);

        for subject in ["alice", "bob@example.com", "ユーザー", ""] {
            let token = svc.issue_for_user(subject).unwrap();
            assert_eq!(
                svc.validate(token.as_str()),
                ValidationResult::Valid(subject.to_string())
            );
        }
    }

    #[test]
    fn validate_honors_exact_expiry_boundary() {
        let (svc, clock) = service(1, 86400);
        let token = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::milliseconds(900));
        assert_eq!(
            svc.validate(token.as_str()),
            ValidationResult::Valid("alice".to_string())
        );

        // exactly at expiry is still valid
        clock.advance(Duration::milliseconds(100));
        assert_eq!(
            svc.validate(token.as_str()),
            ValidationResult::Valid("alice".to_string())
        );

        clock.advance(Duration::milliseconds(100));
        assert_eq!(svc.validate(token.as_str()), ValidationResult::Expired);
    }

    #[test]
    fn expiry_boundary_holds_from_a_fractional_second() {
        let (svc, clock) = service_at(START * 1000 + 700, 1, 86400);
        let token = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::milliseconds(900));
        assert_eq!(svc.validate(token.as_str()), valid("alice"));

        clock.advance(Duration::milliseconds(100));
        assert_eq!(svc.validate(token.as_str()), valid("alice"));

        clock.advance(Duration::milliseconds(100));
        assert_eq!(svc.validate(token.as_str()), ValidationResult::Expired);
    }

    #[test]
    fn sub_millisecond_clock_never_shortens_lifetime() {
        let (svc, clock) = service_at(START * 1000 + 700, 1, 86400);
        clock.advance(Duration::microseconds(999));
        let token = svc.issue_for_user("alice").unwrap();

        // 1s after issuance, measured from the precise instant
        clock.advance(Duration::seconds(1));
        assert_eq!(svc.validate(token.as_str()), valid("alice"));

        clock.advance(Duration::milliseconds(1));
        assert_eq!(svc.validate(token.as_str()), ValidationResult::Expired);
    }

    #[test]
    fn validate_rejects_any_signature_change() {
        let (svc, _) = service(3600, 86400);
        let token = svc.issue_for_user("alice").unwrap();
        let value = token.as_str();
        let sig_start = value.rfind('.').unwrap() + 1;

        for i in sig_start..value.len() {
            let mut bytes = value.as_bytes().to_vec();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(
                matches!(svc.validate(&tampered), ValidationResult::Invalid(_)),
                "tampered signature at byte {i} was not rejected"
            );
        }
    }

    #[test]
    fn validate_distinguishes_malformed_from_bad_signature() {
        let (svc, _) = service(3600, 86400);
        let other = TokenCodec::new(b"another-secret-that-is-also-long-enough");
        let foreign = other
            .issue("alice", chrono::DateTime::from_timestamp(START, 0).unwrap(), 60)
            .unwrap();

        assert_eq!(
            svc.validate("not-a-token"),
            ValidationResult::Invalid(InvalidReason::Malformed)
        );
        assert_eq!(
            svc.validate(foreign.as_str()),
            ValidationResult::Invalid(InvalidReason::BadSignature)
        );
    }

    #[test]
    fn refresh_extends_validity() {
        let (svc, clock) = service(3600, 86400);
        let original = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::seconds(600));
        let refreshed = svc.refresh(original.as_str()).unwrap();

        assert_eq!(refreshed.subject(), "alice");
        assert!(refreshed.expires_at() > original.expires_at());
        assert_eq!(refreshed.authenticated_at(), original.issued_at());
        assert_eq!(
            svc.validate(refreshed.as_str()),
            ValidationResult::Valid("alice".to_string())
        );
    }

    #[test]
    fn refresh_within_the_same_second_extends_validity() {
        let (svc, clock) = service_at(START * 1000 + 100, 3600, 86400);
        let original = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::milliseconds(500));
        let refreshed = svc.refresh(original.as_str()).unwrap();

        assert!(refreshed.expires_at() > original.expires_at());
        assert_eq!(
            refreshed.expires_at() - original.expires_at(),
            Duration::milliseconds(500)
        );
        assert_ne!(refreshed.as_str(), original.as_str());
        assert_eq!(refreshed.authenticated_at(), original.issued_at());
    }

    #[test]
    fn refresh_window_edge_is_exact_from_a_fractional_second() {
        let (svc, clock) = service_at(START * 1000 + 700, 60, 1800);
        let original = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::seconds(1800));
        assert!(svc.refresh(original.as_str()).is_ok());

        clock.advance(Duration::milliseconds(1));
        assert!(matches!(
            svc.refresh(original.as_str()).unwrap_err(),
            TokenError::RefreshRejected(RefreshRejection::WindowElapsed)
        ));
    }

    #[test]
    fn refresh_accepts_expired_token_within_window() {
        let (svc, clock) = service(60, 3600);
        let original = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::seconds(120));
        assert_eq!(svc.validate(original.as_str()), ValidationResult::Expired);

        let refreshed = svc.refresh(original.as_str()).unwrap();
        assert_eq!(
            svc.validate(refreshed.as_str()),
            ValidationResult::Valid("alice".to_string())
        );
    }

    #[test]
    fn refresh_rejects_token_past_window_even_if_unexpired() {
        let (svc, clock) = service(3600, 1800);
        let original = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::seconds(1801));
        assert_eq!(
            svc.validate(original.as_str()),
            ValidationResult::Valid("alice".to_string())
        );

        let err = svc.refresh(original.as_str()).unwrap_err();
        assert!(matches!(
            err,
            TokenError::RefreshRejected(RefreshRejection::WindowElapsed)
        ));
    }

    #[test]
    fn refresh_chain_cannot_outlive_window() {
        let (svc, clock) = service(600, 1000);
        let mut token = svc.issue_for_user("alice").unwrap();

        clock.advance(Duration::seconds(500));
        token = svc.refresh(token.as_str()).unwrap();
        clock.advance(Duration::seconds(500));
        token = svc.refresh(token.as_str()).unwrap();

        clock.advance(Duration::seconds(1));
        let err = svc.refresh(token.as_str()).unwrap_err();
        assert!(matches!(
            err,
            TokenError::RefreshRejected(RefreshRejection::WindowElapsed)
        ));
    }

    #[test]
    fn refresh_rejects_malformed_and_forged_tokens() {
        let (svc, _) = service(3600, 86400);
        let other = TokenCodec::new(b"another-secret-that-is-also-long-enough");
        let foreign = other
            .issue("alice", chrono::DateTime::from_timestamp(START, 0).unwrap(), 60)
            .unwrap();

        assert!(matches!(
            svc.refresh("garbage").unwrap_err(),
            TokenError::RefreshRejected(RefreshRejection::Malformed)
        ));
        assert!(matches!(
            svc.refresh(foreign.as_str()).unwrap_err(),
            TokenError::RefreshRejected(RefreshRejection::BadSignature)
        ));
    }
}
