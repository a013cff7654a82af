//! Dependency seams for the client and gateway crates.
//!
//! Each execution context (CLI process, gateway instance, test) wires
//! its own implementations in, so expiry decisions, session fallback
//! reads, and forced sign-out are all injectable rather than ambient
//! module state.

use async_trait::async_trait;

use crate::Result;
use crate::session::SessionRecord;

/// A source of "now", injected so expiry comparisons are testable.
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// The wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A read-only view of the ambient persisted session.
///
/// The token store falls back to this exactly once when its memory is
/// empty; implementations must not perform network calls.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Load the persisted session record, if one exists.
    async fn load(&self) -> Result<Option<SessionRecord>>;
}

/// A persisted session the lifecycle can both read and rewrite.
///
/// The session record is mutated on every read where expiry has
/// passed, so implementations must tolerate frequent small writes.
#[async_trait]
pub trait SessionStore: SessionSource {
    /// Persist the session record, replacing any previous one.
    async fn save(&self, record: &SessionRecord) -> Result<()>;

    /// Destroy the persisted session.
    async fn clear(&self) -> Result<()>;
}

/// The forced sign-out side effect: terminate the ambient session and
/// return the user to the public entry point.
///
/// Implementations must be idempotent; the client guarantees at most
/// one invocation per refresh-failure episode, but a second call must
/// still be harmless.
#[async_trait]
pub trait SignOutHandler: Send + Sync {
    /// Terminate the ambient session.
    async fn sign_out(&self);
}

/// A sign-out handler that does nothing, for contexts (tests, the
/// gateway) that surface the failure some other way.
#[derive(Debug, Clone, Default)]
pub struct NoopSignOut;

#[async_trait]
impl SignOutHandler for NoopSignOut {
    async fn sign_out(&self) {}
}
