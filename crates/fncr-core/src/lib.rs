//! fncr-core - Core types and traits for the FNCR client toolkit.
//!
//! This crate holds the shared vocabulary of the workspace: token
//! newtypes, the token pair with decoded expiry, the session record,
//! the unified error taxonomy, the normalized call outcome, and the
//! dependency seams (clock, session source, sign-out handler) that the
//! client and gateway crates are built against.

pub mod claims;
pub mod error;
pub mod outcome;
pub mod session;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{ApiError, AuthError, Error, InvalidInputError, TransportError};
pub use outcome::Outcome;
pub use session::SessionRecord;
pub use tokens::{AccessToken, RefreshToken, TokenPair};
pub use traits::{Clock, NoopSignOut, SessionSource, SessionStore, SignOutHandler, SystemClock};
pub use types::{ApiUrl, UserProfile};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
