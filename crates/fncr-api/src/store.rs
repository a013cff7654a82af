//! In-memory token cache with a persisted-session fallback.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use fncr_core::{SessionSource, TokenPair};

/// Holder of the current token pair.
///
/// The store is a pure cache: no network calls originate here. When
/// memory is empty it attempts one read from the ambient persisted
/// session (if a source was wired in) and caches whatever complete
/// pair that yields.
pub struct TokenStore {
    tokens: RwLock<Option<TokenPair>>,
    fallback: Option<Arc<dyn SessionSource>>,
}

impl TokenStore {
    /// Create an empty store with no fallback.
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(None),
            fallback: None,
        }
    }

    /// Create an empty store that falls back to the given session
    /// source when memory is empty.
    pub fn with_fallback(fallback: Arc<dyn SessionSource>) -> Self {
        Self {
            tokens: RwLock::new(None),
            fallback: Some(fallback),
        }
    }

    /// The current pair, reading through to the ambient session on a
    /// memory miss. Two consecutive calls with no intervening
    /// [`TokenStore::set`] hit the cache the second time.
    pub async fn get(&self) -> Option<TokenPair> {
        if let Some(pair) = self.tokens.read().await.clone() {
            return Some(pair);
        }

        let source = self.fallback.as_ref()?;
        match source.load().await {
            Ok(Some(record)) => {
                debug!("token store miss, cached pair from persisted session");
                let mut slot = self.tokens.write().await;
                // A concurrent set() wins over the fallback read.
                if slot.is_none() {
                    *slot = Some(record.tokens.clone());
                }
                Some(slot.clone().unwrap_or(record.tokens))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                None
            }
        }
    }

    /// Unconditionally overwrite the cached pair.
    pub async fn set(&self, pair: TokenPair) {
        *self.tokens.write().await = Some(pair);
    }

    /// Empty the cache. Returns whether a pair was actually present,
    /// so sign-out can run its side effects exactly once.
    pub async fn clear(&self) -> bool {
        self.tokens.write().await.take().is_some()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
