use thiserror::Error;

/// Why a refresh request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRejection {
    Malformed,
    BadSignature,
    /// The refresh chain is older than the configured refresh window.
    WindowElapsed,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("token ttl out of range")]
    TtlOutOfRange,

    #[error("refresh rejected: {0:?}")]
    RefreshRejected(RefreshRejection),
}
