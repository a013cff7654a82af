//! Session lifecycle evaluation.
//!
//! [`SessionManager`] owns the session record and re-evaluates it on
//! every read: a record whose access token has passed its expiry is
//! refreshed in place through the shared [`RefreshCoordinator`]; a
//! record whose refresh failed terminally carries the
//! `RefreshAccessTokenError` marker until a new login replaces it.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use fncr_core::{Clock, Result, SessionRecord, SessionStore, SystemClock, TokenPair};

use crate::refresh::RefreshCoordinator;

/// Evaluates and maintains the session record.
pub struct SessionManager {
    record: RwLock<Option<SessionRecord>>,
    persisted: Option<Arc<dyn SessionStore>>,
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a manager with no persistence.
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            record: RwLock::new(None),
            persisted: None,
            coordinator,
            clock: Arc::new(SystemClock),
        }
    }

    /// Persist the record through the given store, and seed the
    /// in-memory record from it on the first read.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.persisted = Some(store);
        self
    }

    /// Use an injected clock for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Install a freshly authenticated session record.
    #[instrument(skip(self, record))]
    pub async fn establish(&self, record: SessionRecord) -> Result<()> {
        info!("establishing fresh session");
        self.persist(&record).await?;
        *self.record.write().await = Some(record);
        Ok(())
    }

    /// Read the session, refreshing it first if its access token has
    /// expired.
    ///
    /// A failed refresh does not return an error: the record comes
    /// back annotated with [`SessionRecord::REFRESH_ERROR`], and the
    /// consumer reacts to that flag by signing out. The annotation
    /// persists until a new login.
    pub async fn current(&self) -> Result<Option<SessionRecord>> {
        self.seed_from_store().await?;

        let mut slot = self.record.write().await;
        let Some(record) = slot.as_mut() else {
            return Ok(None);
        };

        // Terminal state: no further automatic retries.
        if record.has_refresh_error() {
            return Ok(Some(record.clone()));
        }

        // Inclusive boundary: expiring exactly now means expired.
        let now = self.clock.now_ms();
        if !record.tokens.is_expired(now) {
            return Ok(Some(record.clone()));
        }

        debug!("access token expired, refreshing session");
        match self
            .coordinator
            .refresh(record.tokens.refresh().clone())
            .await
        {
            Ok(pair) => {
                record.replace_tokens(pair);
                debug!("session refreshed");
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed, marking record");
                record.mark_refresh_error();
            }
        }

        let snapshot = record.clone();
        drop(slot);

        self.persist(&snapshot).await?;
        Ok(Some(snapshot))
    }

    /// Replace the record's token pair with one obtained elsewhere
    /// (the gateway's per-request refresh path).
    pub async fn apply_refreshed(&self, pair: TokenPair) -> Result<()> {
        let snapshot = {
            let mut slot = self.record.write().await;
            let Some(record) = slot.as_mut() else {
                return Ok(());
            };
            record.replace_tokens(pair);
            record.clone()
        };
        self.persist(&snapshot).await
    }

    /// Mark the record with the terminal refresh failure (the
    /// gateway's path when its own refresh is rejected), so later
    /// reads short-circuit instead of retrying a dead refresh token.
    pub async fn mark_refresh_failed(&self) -> Result<()> {
        let snapshot = {
            let mut slot = self.record.write().await;
            let Some(record) = slot.as_mut() else {
                return Ok(());
            };
            record.mark_refresh_error();
            record.clone()
        };
        warn!("session marked with terminal refresh failure");
        self.persist(&snapshot).await
    }

    /// Destroy the session, in memory and in the persisted store.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        info!("destroying session");
        *self.record.write().await = None;
        if let Some(store) = &self.persisted {
            store.clear().await?;
        }
        Ok(())
    }

    async fn seed_from_store(&self) -> Result<()> {
        if self.record.read().await.is_some() {
            return Ok(());
        }
        let Some(store) = &self.persisted else {
            return Ok(());
        };

        if let Some(record) = store.load().await? {
            let mut slot = self.record.write().await;
            if slot.is_none() {
                debug!("seeded session record from persisted store");
                *slot = Some(record);
            }
        }
        Ok(())
    }

    async fn persist(&self, record: &SessionRecord) -> Result<()> {
        if let Some(store) = &self.persisted {
            store.save(record).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use fncr_core::tokens::{AccessToken, RefreshToken};
    use fncr_core::{ApiUrl, UserProfile};

    use crate::http::HttpClient;
    use crate::store::TokenStore;

    /// A clock pinned to a fixed instant.
    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0
        }
    }

    fn manager(now_ms: i64) -> SessionManager {
        // Backend that nothing listens on; only the no-refresh paths
        // are exercised here.
        let http = Arc::new(HttpClient::new(ApiUrl::new("http://127.0.0.1:9").unwrap()));
        let store = Arc::new(TokenStore::new());
        let coordinator = Arc::new(RefreshCoordinator::new(http, store));
        SessionManager::new(coordinator).with_clock(Arc::new(FixedClock(now_ms)))
    }

    fn record(expires_at_ms: i64) -> SessionRecord {
        SessionRecord::new(
            TokenPair::from_parts(
                AccessToken::new("a1"),
                RefreshToken::new("r1"),
                expires_at_ms,
            ),
            UserProfile::default(),
        )
    }

    #[tokio::test]
    async fn empty_manager_yields_none() {
        let mgr = manager(1_000);
        assert!(mgr.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_record_returned_unchanged() {
        let mgr = manager(1_000);
        mgr.establish(record(2_000)).await.unwrap();

        let rec = mgr.current().await.unwrap().unwrap();
        assert_eq!(rec.tokens.access().as_str(), "a1");
        assert!(!rec.has_refresh_error());
    }

    #[tokio::test]
    async fn expired_record_with_unreachable_backend_marks_error() {
        let mgr = manager(2_000);
        mgr.establish(record(2_000)).await.unwrap();

        // Inclusive boundary: now == expiry triggers refresh; refresh
        // cannot reach the backend, so the record is marked.
        let rec = mgr.current().await.unwrap().unwrap();
        assert!(rec.has_refresh_error());
    }

    #[tokio::test]
    async fn error_state_persists_across_reads() {
        let mgr = manager(2_000);
        mgr.establish(record(1_000)).await.unwrap();

        let first = mgr.current().await.unwrap().unwrap();
        assert!(first.has_refresh_error());

        let second = mgr.current().await.unwrap().unwrap();
        assert!(second.has_refresh_error());
    }

    #[tokio::test]
    async fn new_login_clears_error_state() {
        let mgr = manager(2_000);
        mgr.establish(record(1_000)).await.unwrap();
        assert!(mgr.current().await.unwrap().unwrap().has_refresh_error());

        mgr.establish(record(5_000)).await.unwrap();
        let rec = mgr.current().await.unwrap().unwrap();
        assert!(!rec.has_refresh_error());
    }

    #[tokio::test]
    async fn external_failure_mark_short_circuits_reads() {
        let mgr = manager(1_000);
        mgr.establish(record(2_000)).await.unwrap();

        mgr.mark_refresh_failed().await.unwrap();
        assert!(mgr.current().await.unwrap().unwrap().has_refresh_error());
    }

    #[tokio::test]
    async fn sign_out_destroys_record() {
        let mgr = manager(1_000);
        mgr.establish(record(2_000)).await.unwrap();
        mgr.sign_out().await.unwrap();
        assert!(mgr.current().await.unwrap().is_none());
    }
}
