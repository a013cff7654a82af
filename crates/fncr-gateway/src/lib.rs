//! fncr-gateway - Server-side proxy gateway for the FNCR backend.
//!
//! The gateway forwards inbound requests to the backend, attaching the
//! ambient session's bearer token on behalf of the caller, and applies
//! the detect-401/refresh/retry-once contract per request. Unlike the
//! browser-side client it holds no refresh coordinator: each request
//! performs its own refresh-if-needed check, and the rotated pair is
//! written back into the shared session so later requests observe it.

pub mod proxy;

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use tower_http::trace::TraceLayer;

use fncr_api::SessionManager;
use fncr_core::ApiUrl;

/// Shared gateway state.
pub struct GatewayState {
    /// Backend base URL requests are forwarded to.
    pub backend: ApiUrl,
    /// Upstream HTTP client.
    pub http: reqwest::Client,
    /// The ambient session, read through the lifecycle callback.
    pub sessions: Arc<SessionManager>,
}

impl GatewayState {
    /// Create gateway state over a backend and session manager.
    pub fn new(backend: ApiUrl, sessions: Arc<SessionManager>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fncr-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            backend,
            http,
            sessions,
        }
    }
}

/// Build the axum `Router` with the wildcard forwarding route.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/{*path}", any(proxy::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
