//! The persisted session record.

use serde::{Deserialize, Serialize};

use crate::tokens::TokenPair;
use crate::types::UserProfile;

/// A session record: the credential set plus the authenticated user,
/// as persisted between process runs and re-read on every session
/// evaluation.
///
/// The `error` field is the contract with UI consumers: when it holds
/// [`SessionRecord::REFRESH_ERROR`], the session could not be
/// refreshed and the consumer must force a sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The current token pair.
    #[serde(flatten)]
    pub tokens: TokenPair,
    /// Set when a refresh attempt failed terminally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The backend's projection of the signed-in user.
    pub user: UserProfile,
}

impl SessionRecord {
    /// The error marker written when a token refresh fails.
    pub const REFRESH_ERROR: &'static str = "RefreshAccessTokenError";

    /// Create a record from freshly issued credentials.
    pub fn new(tokens: TokenPair, user: UserProfile) -> Self {
        Self {
            tokens,
            error: None,
            user,
        }
    }

    /// Whether this record is marked with a terminal refresh failure.
    pub fn has_refresh_error(&self) -> bool {
        self.error.as_deref() == Some(Self::REFRESH_ERROR)
    }

    /// Mark the record with the terminal refresh failure.
    pub fn mark_refresh_error(&mut self) {
        self.error = Some(Self::REFRESH_ERROR.to_string());
    }

    /// Replace the token pair after a successful refresh, clearing any
    /// previous error marker.
    pub fn replace_tokens(&mut self, tokens: TokenPair) {
        self.tokens = tokens;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{AccessToken, RefreshToken};

    fn record() -> SessionRecord {
        let tokens = TokenPair::from_parts(
            AccessToken::new("a1"),
            RefreshToken::new("r1"),
            1_700_000_000_000,
        );
        SessionRecord::new(tokens, UserProfile::default())
    }

    #[test]
    fn fresh_record_has_no_error() {
        assert!(!record().has_refresh_error());
    }

    #[test]
    fn refresh_error_round_trips() {
        let mut rec = record();
        rec.mark_refresh_error();

        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("RefreshAccessTokenError"));

        let back: SessionRecord = serde_json::from_str(&json).unwrap();
        assert!(back.has_refresh_error());
    }

    #[test]
    fn replacing_tokens_clears_error() {
        let mut rec = record();
        rec.mark_refresh_error();
        rec.replace_tokens(TokenPair::from_parts(
            AccessToken::new("a2"),
            RefreshToken::new("r2"),
            1_800_000_000_000,
        ));
        assert!(!rec.has_refresh_error());
        assert_eq!(rec.tokens.access().as_str(), "a2");
    }
}
