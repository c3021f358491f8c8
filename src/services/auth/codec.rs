/*
 * Responsibility
 * - Compact signed token (JWS, HS256) encode / decode
 * - Distinguishes "not a token" (MalformedToken) from "tampered token" (signature_valid = false)
 * - No HTTP, no clock: issuance time is always passed in
 */
use std::collections::HashSet;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::services::auth::error::TokenError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims carried in the token payload.
///
/// Timestamps are NumericDate values (unix seconds) with millisecond
/// fractions, so a token lives exactly its TTL and a refresh issued any
/// millisecond later expires later.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: f64,
    exp: f64,
    /// Time of the credential check that started this refresh chain.
    auth_time: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed token: {reason}")]
pub struct MalformedToken {
    pub reason: &'static str,
}

impl MalformedToken {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// An issued token. Immutable; refreshing produces a new instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    subject: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    authenticated_at: DateTime<Utc>,
}

impl Token {
    /// Wire representation (`header.payload.signature`).
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The wire value is a bearer credential; keep it out of logs.
        f.debug_struct("Token")
            .field("subject", &self.subject)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}

/// Result of parsing a token string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub authenticated_at: DateTime<Utc>,
    pub signature_valid: bool,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        // Expiry and claim presence are decided by TokenService / decode();
        // jsonwebtoken is only asked to check the signature.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token that starts a new refresh chain at `issued_at`.
    pub fn issue(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Result<Token, TokenError> {
        self.issue_with_auth_time(subject, issued_at, issued_at, ttl_seconds)
    }

    /// Issue a token that continues an existing refresh chain.
    pub fn issue_with_auth_time(
        &self,
        subject: &str,
        issued_at: DateTime<Utc>,
        authenticated_at: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Result<Token, TokenError> {
        let issued_at = truncate_to_millis(issued_at);
        let authenticated_at = truncate_to_millis(authenticated_at);
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or(TokenError::TtlOutOfRange)?;

        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: numeric_date(issued_at),
            exp: numeric_date(expires_at),
            auth_time: numeric_date(authenticated_at),
        };

        let mut header = Header::new(ALGORITHM);
        header.typ = Some("JWT".to_string());
        let value = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign token");
            TokenError::Signing(e)
        })?;

        Ok(Token {
            value,
            subject: claims.sub,
            issued_at,
            expires_at,
            authenticated_at,
        })
    }

    /// Parse a token string and check its signature.
    ///
    /// A bad signature is reported through `signature_valid`, not as an error.
    pub fn decode(&self, token: &str) -> Result<DecodedToken, MalformedToken> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, signature] = segments.as_slice() else {
            return Err(MalformedToken::new("expected three segments"));
        };

        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| MalformedToken::new("invalid header"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| MalformedToken::new("invalid payload encoding"))?;
        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| MalformedToken::new("invalid signature encoding"))?;

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| MalformedToken::new("invalid claims"))?;

        let signature_valid = header.alg == ALGORITHM
            && jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
                .is_ok();

        Ok(DecodedToken {
            subject: claims.sub,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            authenticated_at: timestamp(claims.auth_time)?,
            signature_valid,
        })
    }
}

/// Precision of every time carried on the wire.
pub(crate) fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

fn numeric_date(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 1000.0
}

fn timestamp(secs: f64) -> Result<DateTime<Utc>, MalformedToken> {
    let out_of_range = || MalformedToken::new("timestamp out of range");

    let millis = (secs * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(out_of_range());
    }
    DateTime::from_timestamp_millis(millis as i64).ok_or_else(out_of_range)
}
