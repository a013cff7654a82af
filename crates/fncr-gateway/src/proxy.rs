//! The forwarding handler.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use fncr_api::endpoints::{RefreshBody, RefreshResponse, TOKEN_REFRESH};
use fncr_core::{SessionRecord, TokenPair};

use crate::GatewayState;

/// Headers never forwarded upstream. Hop-by-hop and connection
/// management belong to each leg of the proxy separately, and any
/// inbound Authorization is replaced with the session's own.
const SKIPPED_REQUEST_HEADERS: [&str; 6] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "accept-encoding",
    "authorization",
];

/// Forward one inbound request to the backend.
#[instrument(skip(state, query, headers, body))]
pub async fn handle(
    State(state): State<Arc<GatewayState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = match state.sessions.current().await {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "failed to read session");
            None
        }
    };

    let token = session
        .as_ref()
        .map(|record| record.tokens.access().as_str().to_string());

    let first = send_upstream(
        &state,
        &method,
        &path,
        query.as_deref(),
        &headers,
        &body,
        token.as_deref(),
    )
    .await;

    let response = match first {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "upstream request failed");
            return proxy_failure();
        }
    };

    let status = response.status();
    if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
        return mirror(response).await;
    }

    // Auth rejection: refresh once if the session still has a usable
    // refresh token, otherwise tell the caller the session is gone.
    let Some(record) = session else {
        return session_expired();
    };
    if record.has_refresh_error() {
        return session_expired();
    }

    debug!(status = status.as_u16(), "upstream rejected token, refreshing");
    let pair = match refresh_once(&state, &record).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "gateway refresh failed");
            // Mark the shared session so later requests short-circuit
            // instead of retrying a dead refresh token.
            if let Err(e) = state.sessions.mark_refresh_failed().await {
                warn!(error = %e, "failed to mark session");
            }
            return session_expired();
        }
    };

    let retry = send_upstream(
        &state,
        &method,
        &path,
        query.as_deref(),
        &headers,
        &body,
        Some(pair.access().as_str()),
    )
    .await;

    match retry {
        Ok(response) => mirror(response).await,
        Err(e) => {
            warn!(error = %e, "upstream retry failed");
            proxy_failure()
        }
    }
}

/// One upstream round trip, status pass-through enabled.
async fn send_upstream(
    state: &GatewayState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: &Bytes,
    token: Option<&str>,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut url = state.backend.endpoint_url(path);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }

    let mut request = state.http.request(method.clone(), &url);

    for (name, value) in headers {
        if SKIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            continue;
        }
        request = request.header(name, value);
    }

    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    if !body.is_empty() {
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        // JSON is parsed and re-serialized; anything else (uploads,
        // binary) passes through untouched. Unparseable JSON is also
        // forwarded raw and left for the backend to reject.
        request = match serde_json::from_slice::<Value>(body) {
            Ok(value) if is_json => request.json(&value),
            _ => request.body(body.clone()),
        };
    }

    request.send().await
}

/// One direct refresh call, deliberately outside any shared
/// coordinator: the gateway accepts duplicate refreshes under
/// concurrent load in exchange for statelessness per request. The
/// rotated pair is written back so later requests observe it.
async fn refresh_once(
    state: &GatewayState,
    record: &SessionRecord,
) -> Result<TokenPair, anyhow::Error> {
    let response = state
        .http
        .post(state.backend.endpoint_url(TOKEN_REFRESH))
        .json(&RefreshBody {
            refresh: record.tokens.refresh().as_str(),
        })
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("refresh endpoint returned {}", response.status());
    }

    let rotated: RefreshResponse = response.json().await?;
    let pair = TokenPair::from_wire(rotated.access, rotated.refresh)?;

    state.sessions.apply_refreshed(pair.clone()).await?;
    Ok(pair)
}

/// Mirror the backend's status and body to the caller.
async fn mirror(response: reqwest::Response) -> Response {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to read upstream body");
            return proxy_failure();
        }
    };

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .unwrap_or_else(|_| proxy_failure())
}

/// The synthetic terminal-auth-failure response.
fn session_expired() -> Response {
    json_response(StatusCode::UNAUTHORIZED, json!({"error": "SessionExpired"}))
}

/// The synthetic transport-failure response.
fn proxy_failure() -> Response {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"message": "Proxy request failed"}),
    )
}

fn json_response(status: StatusCode, body: Value) -> Response {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("static response construction cannot fail")
}
