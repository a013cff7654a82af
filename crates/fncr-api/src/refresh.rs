//! Single-flight token refresh coordination.
//!
//! Any number of callers may discover an expired or rejected token at
//! the same time; exactly one of them (the leader) performs the
//! backend refresh call while the rest wait as queued resolvers and
//! observe the leader's outcome. The `refreshing` flag and the waiter
//! queue are mutated under one lock, and waiters are drained in the
//! same critical section that clears the flag, so no waiter can be
//! enqueued after the episode settles without being released.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use fncr_core::error::{AuthError, Error};
use fncr_core::{RefreshToken, TokenPair};

use crate::endpoints::{RefreshBody, RefreshResponse, TOKEN_REFRESH};
use crate::http::HttpClient;
use crate::store::TokenStore;

type Waiter = oneshot::Sender<Result<TokenPair, AuthError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Coordinates token refresh so at most one backend refresh call is in
/// flight per expiry episode.
pub struct RefreshCoordinator {
    http: Arc<HttpClient>,
    store: Arc<TokenStore>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Create a coordinator over the given transport and token store.
    pub fn new(http: Arc<HttpClient>, store: Arc<TokenStore>) -> Self {
        Self {
            http,
            store,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Exchange `current` for a new token pair.
    ///
    /// Callable concurrently: the first caller per episode issues the
    /// backend call; later callers are enqueued and settle with the
    /// same outcome, in arrival order. On success the new pair is
    /// written to the token store before anyone is released. On
    /// failure every queued caller observes the same
    /// [`AuthError::SessionExpired`].
    #[instrument(skip(self, current))]
    pub async fn refresh(&self, current: RefreshToken) -> Result<TokenPair, Error> {
        let waiter = {
            let mut state = self.state.lock().expect("refresh state poisoned");
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("refresh already in flight, waiting on its outcome");
            return match rx.await {
                Ok(Ok(pair)) => Ok(pair),
                Ok(Err(auth)) => Err(auth.into()),
                // Leader vanished without settling; treat as terminal.
                Err(_) => Err(AuthError::SessionExpired.into()),
            };
        }

        info!("refreshing access token");
        let result = self.call_refresh(&current).await;

        match result {
            Ok(pair) => {
                // The rotated pair must be in the store before the
                // flag clears: a caller racing in right after this
                // episode must read the new credentials, not elect
                // itself leader holding the consumed refresh token.
                self.store.set(pair.clone()).await;
                let waiters = self.settle();
                debug!(waiters = waiters.len(), "refresh succeeded");
                for waiter in waiters {
                    // A cancelled caller dropped its receiver; its
                    // slot is simply abandoned.
                    let _ = waiter.send(Ok(pair.clone()));
                }
                Ok(pair)
            }
            Err(err) => {
                let waiters = self.settle();
                warn!(waiters = waiters.len(), error = %err, "refresh failed");
                for waiter in waiters {
                    let _ = waiter.send(Err(AuthError::SessionExpired));
                }
                Err(err)
            }
        }
    }

    /// Clear the in-flight flag and drain the waiter queue in one
    /// critical section, so no waiter enqueued during the episode can
    /// be stranded.
    fn settle(&self) -> Vec<Waiter> {
        let mut state = self.state.lock().expect("refresh state poisoned");
        state.refreshing = false;
        std::mem::take(&mut state.waiters)
    }

    /// The actual backend call, shared with nothing: cancellation of
    /// the initiating request must not abort an in-flight refresh that
    /// other callers depend on, so it runs under a token nobody holds.
    async fn call_refresh(&self, current: &RefreshToken) -> Result<TokenPair, Error> {
        let response: RefreshResponse = self
            .http
            .post(
                TOKEN_REFRESH,
                &RefreshBody {
                    refresh: current.as_str(),
                },
                None,
                &CancellationToken::new(),
            )
            .await?;

        TokenPair::from_wire(response.access, response.refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_idle() {
        let state = RefreshState::default();
        assert!(!state.refreshing);
        assert!(state.waiters.is_empty());
    }
}
