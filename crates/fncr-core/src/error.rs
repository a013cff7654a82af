//! Error types for the FNCR client toolkit.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, backend API, and input validation errors,
//! plus a distinct terminal variant for cancelled requests.

use std::fmt;
use thiserror::Error;

/// The unified error type for FNCR operations.
///
/// Explicit variants allow callers to handle specific failure modes;
/// [`crate::Outcome`] collapses them into the uniform shape consumed
/// by UI layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (missing tokens, expired session).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-2xx backend responses, carried through verbatim.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Input validation errors (invalid URL, malformed token).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// The request was cancelled by its caller.
    ///
    /// Cancellation is a terminal outcome, not a failure: it never
    /// triggers a retry, a token refresh, or a sign-out.
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// No response was received from the server.
    #[error("no response received")]
    NoResponse,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
///
/// `Clone` is deliberate: a single refresh failure is broadcast to
/// every caller queued behind the in-flight refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The session is expired and could not be refreshed.
    #[error("session expired")]
    SessionExpired,

    /// No refresh token is available to attempt a refresh with.
    #[error("no refresh token available")]
    RefreshTokenMissing,

    /// No credentials are present at all.
    #[error("not authenticated")]
    NotAuthenticated,
}

/// A non-2xx response from the backend.
///
/// The body fields mirror what the backend actually emits on errors:
/// a `detail` string, an `error` code, or a `non_field_errors` list.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable detail message, if present.
    pub detail: Option<String>,
    /// Machine-readable error code, if present.
    pub code: Option<String>,
    /// Field-independent validation errors, if present.
    pub non_field_errors: Vec<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: u16, detail: Option<String>, code: Option<String>) -> Self {
        Self {
            status,
            detail,
            code,
            non_field_errors: Vec::new(),
        }
    }

    /// Whether this status demands the refresh-and-retry path.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// The best available human-readable message.
    pub fn message(&self) -> &str {
        self.detail
            .as_deref()
            .or(self.code.as_deref())
            .or_else(|| self.non_field_errors.first().map(String::as_str))
            .unwrap_or("An error occurred on the server.")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref code) = self.code {
            write!(f, " [{}]", code)?;
        }
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// A token string that cannot be used.
    #[error("invalid token: {reason}")]
    Token { reason: String },

    /// A JWT whose expiry claim cannot be decoded.
    #[error("invalid token claims: {reason}")]
    Claims { reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_prefers_detail() {
        let mut err = ApiError::new(400, Some("bad request".into()), Some("invalid".into()));
        err.non_field_errors.push("field error".into());
        assert_eq!(err.message(), "bad request");
    }

    #[test]
    fn api_error_message_falls_back_to_non_field_errors() {
        let mut err = ApiError::new(400, None, None);
        err.non_field_errors.push("otp expired".into());
        assert_eq!(err.message(), "otp expired");
    }

    #[test]
    fn api_error_message_generic_fallback() {
        let err = ApiError::new(500, None, None);
        assert_eq!(err.message(), "An error occurred on the server.");
    }

    #[test]
    fn auth_error_detection() {
        assert!(ApiError::new(401, None, None).is_auth_error());
        assert!(ApiError::new(403, None, None).is_auth_error());
        assert!(!ApiError::new(404, None, None).is_auth_error());
        assert!(!ApiError::new(500, None, None).is_auth_error());
    }
}
