//! Mock backend tests for the fncr-api library.
//!
//! These tests use wiremock to simulate the backend and exercise the
//! full authenticated-client path: bearer injection, single-flight
//! refresh, retry-once, forced sign-out, and cancellation isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fncr_api::session::{Payload, Verb};
use fncr_api::{ApiSession, SessionManager};
use fncr_core::error::{AuthError, Error};
use fncr_core::{
    ApiUrl, Outcome, RefreshToken, Result, SessionRecord, SessionSource, SignOutHandler, TokenPair,
    UserProfile,
};

/// Forge an unsigned JWT whose `exp` claim is `exp_secs`.
fn forge_jwt(exp_secs: i64, marker: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp_secs},"sub":"{marker}"}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

fn backend_url(server: &MockServer) -> ApiUrl {
    ApiUrl::new(server.uri()).unwrap()
}

/// Sign-out handler that counts invocations.
#[derive(Default)]
struct CountingSignOut {
    calls: AtomicUsize,
}

#[async_trait]
impl SignOutHandler for CountingSignOut {
    async fn sign_out(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session source yielding a fixed record.
struct FixedSource(SessionRecord);

#[async_trait]
impl SessionSource for FixedSource {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        Ok(Some(self.0.clone()))
    }
}

fn user_json() -> serde_json::Value {
    json!({
        "id": 7,
        "email": "smb@example.com",
        "name": "Acme Bakery",
        "user_type": "SMB",
        "onboarding_status": "IN_PROGRESS",
        "session_id": "sess-1"
    })
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn verify_otp_seeds_token_store() {
    let server = MockServer::start().await;
    let access = forge_jwt(4_000_000_000, "a1");

    Mock::given(method("POST"))
        .and(path("/api/users/verify-otp/"))
        .and(body_json(json!({
            "email": "smb@example.com",
            "otp_code": "123456"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": access,
            "refresh": "R1",
            "user": user_json()
        })))
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    let record = session
        .verify_otp("smb@example.com", "123456", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.user.email, "smb@example.com");
    assert_eq!(record.tokens.expires_at_ms(), 4_000_000_000_000);

    let cached = session.store().get().await.unwrap();
    assert_eq!(cached.access().as_str(), access);
    assert_eq!(cached.refresh().as_str(), "R1");
}

#[tokio::test]
async fn fresh_token_is_reused_without_refresh() {
    let server = MockServer::start().await;
    let access = forge_jwt(4_000_000_000, "a1");

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .and(header("authorization", format!("Bearer {access}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    session
        .store()
        .set(TokenPair::from_wire(access.clone(), "R1").unwrap())
        .await;

    let outcome = session.current_user(&CancellationToken::new()).await;
    let user = outcome.into_data().unwrap();
    assert_eq!(user.id, 7);
}

// ============================================================================
// Single-flight refresh
// ============================================================================

#[tokio::test]
async fn concurrent_auth_failures_trigger_one_refresh() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");
    let new = forge_jwt(4_000_000_000, "a2");

    // The stale token is rejected; the refreshed one is accepted.
    Mock::given(method("GET"))
        .and(path("/core/deal-abstracts/current/"))
        .and(header("authorization", format!("Bearer {old}")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token expired"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/core/deal-abstracts/current/"))
        .and(header("authorization", format!("Bearer {new}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stage": "review"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(50))
                .set_body_json(json!({"access": new, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    session
        .store()
        .set(TokenPair::from_wire(old.clone(), "R1").unwrap())
        .await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session
                .request(
                    Verb::Get,
                    "core/deal-abstracts/current/",
                    Payload::None,
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["stage"], "review");
    }

    // All callers now share the rotated pair.
    let cached = session.store().get().await.unwrap();
    assert_eq!(cached.refresh().as_str(), "R2");

    server.verify().await;
}

#[tokio::test]
async fn store_holds_rotated_pair_before_any_refresh_caller_resumes() {
    let server = MockServer::start().await;
    let new = forge_jwt(4_000_000_000, "a2");

    // Exactly one exchange of R1; a second leader holding the consumed
    // token would surface as an unmatched request here.
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(50))
                .set_body_json(json!({"access": new, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coordinator = session.coordinator().clone();
        let store = session.store().clone();
        handles.push(tokio::spawn(async move {
            let pair = coordinator.refresh(RefreshToken::new("R1")).await.unwrap();
            // Whichever slot this caller held, the store already
            // reflects the rotation by the time it resumes.
            let cached = store.get().await.unwrap();
            assert_eq!(cached.refresh().as_str(), "R2");
            pair
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().refresh().as_str(), "R2");
    }
    server.verify().await;
}

// ============================================================================
// Retry-once and escalation
// ============================================================================

#[tokio::test]
async fn persistent_auth_failure_retries_once_then_signs_out() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");
    let new = forge_jwt(4_000_000_000, "a2");

    // Rejects every credential, old and new.
    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "Forbidden"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": new, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sign_out = Arc::new(CountingSignOut::default());
    let session = ApiSession::builder(backend_url(&server))
        .with_sign_out(sign_out.clone())
        .build();
    session
        .store()
        .set(TokenPair::from_wire(old.clone(), "R1").unwrap())
        .await;

    let result = session
        .request(
            Verb::Get,
            "api/users/me/",
            Payload::None,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(Error::Auth(AuthError::SessionExpired))));
    assert_eq!(sign_out.calls.load(Ordering::SeqCst), 1);
    assert!(session.store().get().await.is_none());

    // Original attempt plus exactly one replay, no third attempt.
    let hits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/users/me/")
        .count();
    assert_eq!(hits, 2);
}

#[tokio::test]
async fn rejected_refresh_fails_all_waiters_and_signs_out_once() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");

    Mock::given(method("GET"))
        .and(path("/core/matches/algorithmic-match/smb-1/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token expired"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_delay(Duration::from_millis(50))
                .set_body_json(json!({"detail": "Refresh token invalid"})),
        )
        .mount(&server)
        .await;

    let sign_out = Arc::new(CountingSignOut::default());
    let session = ApiSession::builder(backend_url(&server))
        .with_sign_out(sign_out.clone())
        .build();
    session
        .store()
        .set(TokenPair::from_wire(old.clone(), "R1").unwrap())
        .await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session
                .request(
                    Verb::Get,
                    "core/matches/algorithmic-match/smb-1/",
                    Payload::None,
                    &CancellationToken::new(),
                )
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Auth(AuthError::SessionExpired))));
    }

    // Sign-out fires exactly once, not once per waiter.
    assert_eq!(sign_out.calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Pass-through of non-auth errors
// ============================================================================

#[tokio::test]
async fn non_auth_errors_pass_through_without_retry() {
    let server = MockServer::start().await;
    let access = forge_jwt(4_000_000_000, "a1");

    Mock::given(method("GET"))
        .and(path("/core/chat-sessions/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "detail": "Not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    session
        .store()
        .set(TokenPair::from_wire(access.clone(), "R1").unwrap())
        .await;

    let outcome = session.chat_session("missing", &CancellationToken::new()).await;
    assert_eq!(
        outcome,
        Outcome::Error {
            data: "Not found".into(),
            code: 404
        }
    );

    server.verify().await;
}

#[tokio::test]
async fn transport_failure_maps_to_no_response() {
    // Nothing listens here.
    let base = ApiUrl::new("http://127.0.0.1:9").unwrap();
    let session = ApiSession::builder(base).build();

    let outcome = session.current_user(&CancellationToken::new()).await;
    assert_eq!(
        outcome,
        Outcome::Error {
            data: "No response received from the server.".into(),
            code: 503
        }
    );
}

// ============================================================================
// Cancellation isolation
// ============================================================================

#[tokio::test]
async fn cancelled_request_is_a_distinct_outcome_and_touches_nothing() {
    let server = MockServer::start().await;
    let access = forge_jwt(4_000_000_000, "a1");

    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(user_json()),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sign_out = Arc::new(CountingSignOut::default());
    let session = ApiSession::builder(backend_url(&server))
        .with_sign_out(sign_out.clone())
        .build();
    session
        .store()
        .set(TokenPair::from_wire(access.clone(), "R1").unwrap())
        .await;

    let cancel = CancellationToken::new();
    let task = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.current_user(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = task.await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Cancelled {
            data: "Request cancelled".into()
        }
    );

    // No refresh, no sign-out, token pair untouched.
    assert_eq!(sign_out.calls.load(Ordering::SeqCst), 0);
    assert!(session.store().get().await.is_some());
    server.verify().await;
}

#[tokio::test]
async fn cancelling_a_waiter_abandons_its_slot_without_poisoning_the_refresh() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");
    let new = forge_jwt(4_000_000_000, "a2");

    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .and(header("authorization", format!("Bearer {old}")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token expired"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .and(header("authorization", format!("Bearer {new}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_json(json!({"access": new, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    session
        .store()
        .set(TokenPair::from_wire(old.clone(), "R1").unwrap())
        .await;

    let cancel = CancellationToken::new();
    let cancelled_task = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.current_user(&cancel).await })
    };
    let surviving_task = {
        let session = session.clone();
        tokio::spawn(async move { session.current_user(&CancellationToken::new()).await })
    };

    // Cancel one caller while the shared refresh is still in flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let cancelled = cancelled_task.await.unwrap();
    assert!(cancelled.is_cancelled());

    let survived = surviving_task.await.unwrap();
    assert_eq!(survived.into_data().unwrap().id, 7);

    // The refresh settled normally despite the abandoned waiter.
    let cached = session.store().get().await.unwrap();
    assert_eq!(cached.refresh().as_str(), "R2");
    server.verify().await;
}

// ============================================================================
// Token store fallback
// ============================================================================

#[tokio::test]
async fn empty_store_falls_back_to_persisted_session() {
    let server = MockServer::start().await;
    let access = forge_jwt(4_000_000_000, "a1");

    Mock::given(method("GET"))
        .and(path("/api/users/me/"))
        .and(header("authorization", format!("Bearer {access}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;

    let record = SessionRecord::new(
        TokenPair::from_wire(access.clone(), "R1").unwrap(),
        UserProfile::default(),
    );
    let session = ApiSession::builder(backend_url(&server))
        .with_session_source(Arc::new(FixedSource(record)))
        .build();

    let outcome = session.current_user(&CancellationToken::new()).await;
    assert_eq!(outcome.into_data().unwrap().id, 7);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn expired_session_record_is_refreshed_on_read() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");
    let new = forge_jwt(4_000_000_000, "a2");

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": new, "refresh": "R2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    let manager = SessionManager::new(session.coordinator().clone());

    manager
        .establish(SessionRecord::new(
            TokenPair::from_wire(old.clone(), "R1").unwrap(),
            UserProfile::default(),
        ))
        .await
        .unwrap();

    let record = manager.current().await.unwrap().unwrap();
    assert!(!record.has_refresh_error());
    assert_eq!(record.tokens.refresh().as_str(), "R2");
    assert_eq!(record.tokens.expires_at_ms(), 4_000_000_000_000);

    server.verify().await;
}

#[tokio::test]
async fn failed_session_refresh_marks_record_for_consumers() {
    let server = MockServer::start().await;
    let old = forge_jwt(1, "a1");

    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "detail": "Refresh token invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = ApiSession::builder(backend_url(&server)).build();
    let manager = SessionManager::new(session.coordinator().clone());

    manager
        .establish(SessionRecord::new(
            TokenPair::from_wire(old.clone(), "R1").unwrap(),
            UserProfile::default(),
        ))
        .await
        .unwrap();

    let record = manager.current().await.unwrap().unwrap();
    assert!(record.has_refresh_error());

    // The marker persists; no second refresh attempt happens.
    let again = manager.current().await.unwrap().unwrap();
    assert!(again.has_refresh_error());
    server.verify().await;
}
