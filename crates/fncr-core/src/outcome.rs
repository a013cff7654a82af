//! The normalized call outcome consumed by UI layers.
//!
//! Every transport-specific failure mode is collapsed into one shape
//! at the client boundary so consumers never branch on exception
//! types: success with data, an error message plus code, or a
//! cancelled marker.

use serde::{Deserialize, Serialize};

use crate::error::{Error, TransportError};

/// The uniform result of an API call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    /// The call succeeded; `data` is the response body.
    Success { data: T },
    /// The call failed; `data` is a human-readable message and `code`
    /// the HTTP status (or a fixed sentinel for transport failures).
    Error { data: String, code: u16 },
    /// The call was cancelled by its caller.
    Cancelled { data: String },
}

impl<T> Outcome<T> {
    /// Sentinel code for "no response received".
    pub const NO_RESPONSE_CODE: u16 = 503;

    /// Sentinel code for request-setup failures.
    pub const SETUP_FAILURE_CODE: u16 = 500;

    /// Normalize a library result into the uniform shape.
    pub fn from_result(result: Result<T, Error>) -> Self {
        match result {
            Ok(data) => Outcome::Success { data },
            Err(Error::Cancelled) => Outcome::Cancelled {
                data: "Request cancelled".to_string(),
            },
            Err(Error::Api(err)) => Outcome::Error {
                data: err.message().to_string(),
                code: err.status,
            },
            Err(Error::Transport(TransportError::NoResponse))
            | Err(Error::Transport(TransportError::Connection { .. }))
            | Err(Error::Transport(TransportError::Timeout)) => Outcome::Error {
                data: "No response received from the server.".to_string(),
                code: Self::NO_RESPONSE_CODE,
            },
            Err(Error::Auth(err)) => Outcome::Error {
                data: err.to_string(),
                code: 401,
            },
            Err(_) => Outcome::Error {
                data: "Unexpected error occurred while setting up the request.".to_string(),
                code: Self::SETUP_FAILURE_CODE,
            },
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Whether the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled { .. })
    }

    /// The payload, if the call succeeded.
    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Success { data } => Some(data),
            _ => None,
        }
    }
}
