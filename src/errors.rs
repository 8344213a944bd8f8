//! Error types shared across Expiry Watch.
//!
//! The two external call sites of the scheduled jobs each get their own
//! error kind (`ProbeError`, `NotifyError`) so the job loops can decide
//! between continue and abort by matching on them. Everything else flows
//! through `WatchError`.

use thiserror::Error;

/// Failure to read a leaf certificate's expiry from a live endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The URL could not be parsed or has no hostname.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// TCP connect failed (refused, unreachable, DNS, timeout).
    #[error("connection failed: {0}")]
    ConnectError(String),
    /// TLS handshake failed or timed out.
    #[error("TLS handshake failed: {0}")]
    HandshakeError(String),
    /// No certificate was presented or its expiry could not be read.
    #[error("certificate parse error: {0}")]
    ParseError(String),
}

/// Failure to hand a notification to the mail relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The relay rejected our credentials.
    #[error("mail relay authentication failed: {0}")]
    AuthError(String),
    /// Transport error or relay rejection after authentication.
    #[error("mail submission failed: {0}")]
    SubmissionError(String),
    /// A recipient (or the sender) is not a usable address.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// General error type for configuration, storage and the HTTP surface.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error(transparent)]
    Probe(#[from] ProbeError),
}

/// Convenience alias used throughout the crate.
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_converts_into_watch_error() {
        let err: WatchError = ProbeError::InvalidUrl("no hostname".to_string()).into();
        assert!(matches!(err, WatchError::Probe(ProbeError::InvalidUrl(_))));
        assert_eq!(err.to_string(), "invalid URL: no hostname");
    }

    #[test]
    fn notify_error_messages_name_the_stage() {
        let auth = NotifyError::AuthError("535 bad credentials".to_string());
        assert!(auth.to_string().contains("authentication"));

        let submit = NotifyError::SubmissionError("connection reset".to_string());
        assert!(submit.to_string().contains("submission"));
    }
}
