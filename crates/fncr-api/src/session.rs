//! The authenticated client.
//!
//! [`ApiSession`] wraps every outbound backend call: it attaches the
//! bearer token from the token store, detects `401`/`403` responses,
//! refreshes through the [`RefreshCoordinator`], replays the rejected
//! request exactly once, and escalates to forced sign-out when the
//! refresh itself is rejected. It is an explicit, constructible object
//! with injected dependencies; each execution context owns its own
//! instance and therefore its own refresh coordination scope.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use fncr_core::error::{AuthError, Error};
use fncr_core::{
    ApiUrl, NoopSignOut, Outcome, RefreshToken, SessionRecord, SessionSource, SignOutHandler,
    TokenPair, UserProfile,
};

use crate::endpoints::{
    self, RequestOtpBody, VerifyOtpBody, VerifyOtpResponse,
};
use crate::http::{HttpClient, UploadPart, from_value};
use crate::refresh::RefreshCoordinator;
use crate::store::TokenStore;

/// HTTP verb for a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
}

/// Body of a backend call, kept in an owned, replayable form so the
/// retry after a refresh can resend it unchanged.
#[derive(Debug, Clone)]
pub enum Payload {
    None,
    Json(Value),
    Multipart(Vec<UploadPart>),
}

/// Builder for [`ApiSession`].
pub struct ApiSessionBuilder {
    base: ApiUrl,
    source: Option<Arc<dyn SessionSource>>,
    sign_out: Arc<dyn SignOutHandler>,
}

impl ApiSessionBuilder {
    /// Fall back to this persisted-session source when the in-memory
    /// token cache is empty.
    pub fn with_session_source(mut self, source: Arc<dyn SessionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Invoke this handler when the session is terminated by a
    /// refresh failure.
    pub fn with_sign_out(mut self, handler: Arc<dyn SignOutHandler>) -> Self {
        self.sign_out = handler;
        self
    }

    /// Build the session.
    pub fn build(self) -> ApiSession {
        let http = Arc::new(HttpClient::new(self.base));
        let store = Arc::new(match self.source {
            Some(source) => TokenStore::with_fallback(source),
            None => TokenStore::new(),
        });
        let refresh = Arc::new(RefreshCoordinator::new(Arc::clone(&http), Arc::clone(&store)));

        ApiSession {
            http,
            store,
            refresh,
            sign_out: self.sign_out,
        }
    }
}

/// An authenticated connection to the backend.
///
/// Cheap to clone; clones share the same token store and refresh
/// coordination scope.
#[derive(Clone)]
pub struct ApiSession {
    http: Arc<HttpClient>,
    store: Arc<TokenStore>,
    refresh: Arc<RefreshCoordinator>,
    sign_out: Arc<dyn SignOutHandler>,
}

impl ApiSession {
    /// Start building a session against the given backend base URL.
    pub fn builder(base: ApiUrl) -> ApiSessionBuilder {
        ApiSessionBuilder {
            base,
            source: None,
            sign_out: Arc::new(NoopSignOut),
        }
    }

    /// The token store backing this session.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// The refresh coordinator backing this session.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    /// The underlying transport.
    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Ask the backend to send a one-time passcode.
    pub async fn request_otp(
        &self,
        email: &str,
        otp_type: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Post,
                endpoints::REQUEST_OTP,
                Payload::Json(
                    serde_json::to_value(RequestOtpBody { email, otp_type })
                        .unwrap_or(Value::Null),
                ),
                cancel,
            )
            .await,
        )
    }

    /// Exchange a one-time passcode for a session.
    ///
    /// On success the freshly issued token pair (with its expiry
    /// decoded at receipt) is cached in the token store, and the full
    /// session record is returned for the caller to persist.
    #[instrument(skip(self, otp_code, cancel))]
    pub async fn verify_otp(
        &self,
        email: &str,
        otp_code: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionRecord, Error> {
        info!("verifying one-time passcode");

        let response: VerifyOtpResponse = self
            .http
            .post(
                endpoints::VERIFY_OTP,
                &VerifyOtpBody { email, otp_code },
                None,
                cancel,
            )
            .await?;

        let pair = TokenPair::from_wire(response.access, response.refresh)?;
        self.store.set(pair.clone()).await;

        debug!("session established");
        Ok(SessionRecord::new(pair, response.user))
    }

    /// Clear the token store and terminate the ambient session.
    ///
    /// The handler side effect runs at most once per episode: whoever
    /// actually empties the store fires it, and later callers (for
    /// instance every waiter behind a failed refresh) find the store
    /// already empty and skip it.
    pub async fn force_sign_out(&self) {
        if self.store.clear().await {
            info!("forcing sign-out");
            self.sign_out.sign_out().await;
        }
    }

    // ========================================================================
    // Typed endpoint wrappers
    // ========================================================================

    /// The current user projection.
    pub async fn current_user(&self, cancel: &CancellationToken) -> Outcome<UserProfile> {
        Outcome::from_result(
            match self
                .request(Verb::Get, endpoints::CURRENT_USER, Payload::None, cancel)
                .await
            {
                Ok(value) => from_value(value),
                Err(e) => Err(e),
            },
        )
    }

    /// Patch fields on a user resource.
    pub async fn update_user(
        &self,
        id: i64,
        fields: Value,
        cancel: &CancellationToken,
    ) -> Outcome<UserProfile> {
        Outcome::from_result(
            match self
                .request(
                    Verb::Patch,
                    &endpoints::user_path(id),
                    Payload::Json(fields),
                    cancel,
                )
                .await
            {
                Ok(value) => from_value(value),
                Err(e) => Err(e),
            },
        )
    }

    /// Start SMB onboarding from a website address.
    pub async fn initiate_smb_onboarding(
        &self,
        website: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Post,
                endpoints::SMB_INITIATE,
                Payload::Json(serde_json::json!({ "website": website })),
                cancel,
            )
            .await,
        )
    }

    /// Patch fields on an SMB resource.
    pub async fn update_smb(
        &self,
        id: i64,
        fields: Value,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Patch,
                &endpoints::smb_path(id),
                Payload::Json(fields),
                cancel,
            )
            .await,
        )
    }

    /// Start lender onboarding from a website address.
    pub async fn initiate_lender_onboarding(
        &self,
        website: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Post,
                endpoints::LENDER_INITIATE,
                Payload::Json(serde_json::json!({ "website": website })),
                cancel,
            )
            .await,
        )
    }

    /// Patch fields on a lender resource.
    pub async fn update_lender(
        &self,
        id: i64,
        fields: Value,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Patch,
                &endpoints::lender_path(id),
                Payload::Json(fields),
                cancel,
            )
            .await,
        )
    }

    /// The algorithmic lender matches for an SMB.
    pub async fn algorithmic_matches(
        &self,
        smb_id: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Get,
                &endpoints::algorithmic_match_path(smb_id),
                Payload::None,
                cancel,
            )
            .await,
        )
    }

    /// The caller's in-progress deal abstract.
    pub async fn current_deal_abstract(&self, cancel: &CancellationToken) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Get,
                endpoints::CURRENT_DEAL_ABSTRACT,
                Payload::None,
                cancel,
            )
            .await,
        )
    }

    /// Feed a chat turn into deal-abstract processing.
    pub async fn process_deal_chat(
        &self,
        parts: Vec<UploadPart>,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Post,
                endpoints::PROCESS_DEAL_CHAT,
                Payload::Multipart(parts),
                cancel,
            )
            .await,
        )
    }

    /// Bulk-upload documents.
    pub async fn bulk_upload_documents(
        &self,
        parts: Vec<UploadPart>,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Post,
                endpoints::BULK_UPLOAD_DOCUMENTS,
                Payload::Multipart(parts),
                cancel,
            )
            .await,
        )
    }

    /// Fetch a chat session by id.
    pub async fn chat_session(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Value> {
        Outcome::from_result(
            self.request(
                Verb::Get,
                &endpoints::chat_session_path(session_id),
                Payload::None,
                cancel,
            )
            .await,
        )
    }

    // ========================================================================
    // Core request path
    // ========================================================================

    /// Issue one backend call with the detect/refresh/retry-once
    /// contract applied.
    #[instrument(skip(self, payload, cancel))]
    pub async fn request(
        &self,
        verb: Verb,
        path: &str,
        payload: Payload,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        let token = self.store.get().await;
        let first = self
            .dispatch(verb, path, &payload, token.as_ref(), cancel)
            .await;

        match first {
            Err(Error::Api(ref e)) if e.is_auth_error() => {
                debug!(status = e.status, path, "auth failure, attempting refresh");
            }
            other => return other,
        }

        // One refresh, then one replay with the Authorization header
        // replaced. Everything past this point is the escalation path.
        let used_access = token.map(|p| p.access().as_str().to_string());
        let current = match self.store.get().await {
            Some(pair) => pair,
            None => {
                warn!("auth failure with no refresh token available");
                self.force_sign_out().await;
                return Err(AuthError::SessionExpired.into());
            }
        };

        // Another caller may have already rotated the pair since our
        // first attempt; replaying with it counts as this episode's
        // one refresh.
        let pair = if used_access.as_deref() != Some(current.access().as_str()) {
            current
        } else {
            match self.refresh_with_cancel(current.refresh().clone(), cancel).await {
                Ok(pair) => pair,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(error = %e, "refresh rejected, terminating session");
                    self.force_sign_out().await;
                    return Err(AuthError::SessionExpired.into());
                }
            }
        };

        match self
            .dispatch(verb, path, &payload, Some(&pair), cancel)
            .await
        {
            Err(Error::Api(ref e)) if e.is_auth_error() => {
                warn!(status = e.status, path, "retry rejected, terminating session");
                self.force_sign_out().await;
                Err(AuthError::SessionExpired.into())
            }
            other => other,
        }
    }

    /// Run the coordinator's refresh without tying its fate to this
    /// caller: a cancelled caller abandons its slot, but the shared
    /// refresh keeps running for everyone queued behind it.
    async fn refresh_with_cancel(
        &self,
        token: RefreshToken,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, Error> {
        let coordinator = Arc::clone(&self.refresh);
        let handle = tokio::spawn(async move { coordinator.refresh(token).await });

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            joined = handle => match joined {
                Ok(result) => result,
                Err(_) => Err(AuthError::SessionExpired.into()),
            },
        }
    }

    /// One transport round trip with the given credentials, no retry.
    async fn dispatch(
        &self,
        verb: Verb,
        path: &str,
        payload: &Payload,
        pair: Option<&TokenPair>,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        let token = pair.map(|p| p.access());

        match (verb, payload) {
            (Verb::Get, _) => self.http.get(path, token, cancel).await,
            (Verb::Post, Payload::Json(body)) => self.http.post(path, body, token, cancel).await,
            (Verb::Post, Payload::Multipart(parts)) => {
                self.http.post_multipart(path, parts, token, cancel).await
            }
            (Verb::Post, Payload::None) => {
                self.http.post(path, &Value::Null, token, cancel).await
            }
            (Verb::Patch, Payload::Json(body)) => self.http.patch(path, body, token, cancel).await,
            (Verb::Patch, _) => self.http.patch(path, &Value::Null, token, cancel).await,
        }
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("base", self.http.base())
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
