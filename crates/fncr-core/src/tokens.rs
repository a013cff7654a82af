//! Token types for backend authentication.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claims::decode_expiry_ms;
use crate::error::{Error, InvalidInputError};

/// An access token for authenticated API requests.
///
/// Access tokens are short-lived JWTs used to authorize requests to
/// the backend.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque apart from the expiry claim decoded at receipt
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Create a new access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in authorization headers.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// A refresh token for obtaining new access tokens.
///
/// Refresh tokens are longer-lived, single-use-before-rotation
/// credentials exchanged for a fresh token pair when the access token
/// expires.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    /// Create a new refresh token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in refresh requests.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

/// A complete credential set: access token, refresh token, and the
/// access token's absolute expiry in epoch milliseconds.
///
/// A `TokenPair` is either fully present or not constructed at all;
/// partial states (one token without the other, missing expiry) are
/// unrepresentable. Pairs are created on login or refresh, replaced
/// wholesale on each refresh, and dropped on sign-out.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenPair {
    access: AccessToken,
    refresh: RefreshToken,
    expires_at_ms: i64,
}

impl TokenPair {
    /// Build a pair from the raw strings the backend returns,
    /// decoding the access token's expiry claim at receipt time.
    ///
    /// # Errors
    ///
    /// Returns an error if either token string is empty or the access
    /// token carries no decodable `exp` claim.
    pub fn from_wire(access: impl Into<String>, refresh: impl Into<String>) -> Result<Self, Error> {
        let access = access.into();
        let refresh = refresh.into();

        if access.is_empty() || refresh.is_empty() {
            return Err(Error::InvalidInput(InvalidInputError::Token {
                reason: "token pair must be fully present".to_string(),
            }));
        }

        let expires_at_ms = decode_expiry_ms(&access)?;

        Ok(Self {
            access: AccessToken::new(access),
            refresh: RefreshToken::new(refresh),
            expires_at_ms,
        })
    }

    /// Rebuild a pair from persisted parts, when the expiry is already
    /// known and the tokens do not need re-decoding.
    pub fn from_parts(access: AccessToken, refresh: RefreshToken, expires_at_ms: i64) -> Self {
        Self {
            access,
            refresh,
            expires_at_ms,
        }
    }

    /// The access token.
    pub fn access(&self) -> &AccessToken {
        &self.access
    }

    /// The refresh token.
    pub fn refresh(&self) -> &RefreshToken {
        &self.refresh
    }

    /// Absolute access-token expiry, epoch milliseconds.
    pub fn expires_at_ms(&self) -> i64 {
        self.expires_at_ms
    }

    /// Whether the access token is expired at `now_ms`.
    ///
    /// The boundary is inclusive: a token expiring exactly now is
    /// treated as expired, forcing a proactive refresh rather than a
    /// doomed request.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

// Custom Debug impl that hides token material
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}
