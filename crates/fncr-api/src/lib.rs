//! fncr-api - Authenticated client library for the FNCR backend.
//!
//! All authenticated traffic flows through an [`ApiSession`], which
//! owns the token cache, coordinates token refresh so that at most one
//! refresh call is ever in flight, retries an auth-rejected request
//! exactly once, and escalates to forced sign-out when the refresh
//! token itself is rejected.
//!
//! # Example
//!
//! ```no_run
//! use fncr_api::ApiSession;
//! use fncr_core::ApiUrl;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fncr_core::Error> {
//! let base = ApiUrl::new("https://server.fncr.com")?;
//! let session = ApiSession::builder(base).build();
//!
//! session.request_otp("smb@example.com", "EMAIL", &CancellationToken::new()).await;
//! let record = session.verify_otp("smb@example.com", "123456", &CancellationToken::new()).await?;
//! println!("Logged in as: {}", record.user.email);
//! # Ok(())
//! # }
//! ```

pub mod endpoints;
pub mod http;
pub mod lifecycle;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;

pub use http::HttpClient;
pub use lifecycle::SessionManager;
pub use refresh::RefreshCoordinator;
pub use session::ApiSession;
pub use storage::SessionFile;
pub use store::TokenStore;
