//! HTTP transport for backend requests.
//!
//! [`HttpClient`] is a thin reqwest wrapper: it joins endpoint paths
//! onto the backend base URL, attaches bearer tokens when asked,
//! parses the backend's error body shape, and races every send
//! against a cancellation token. It never retries and never refreshes;
//! that is [`crate::ApiSession`]'s job.

use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use fncr_core::error::{ApiError, Error, TransportError};
use fncr_core::{AccessToken, ApiUrl};

/// A single part of a multipart upload.
///
/// Upload bodies are kept as owned parts (rather than a built form) so
/// a rejected request can be rebuilt and replayed after a refresh.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub name: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// The shape the backend uses for error bodies.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    non_field_errors: Vec<String>,
}

/// HTTP client for backend requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base: ApiUrl,
}

impl HttpClient {
    /// Create a new client for the given backend base URL.
    pub fn new(base: ApiUrl) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fncr/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self { client, base }
    }

    /// Returns the backend base URL this client is configured for.
    pub fn base(&self) -> &ApiUrl {
        &self.base
    }

    /// GET an endpoint.
    #[instrument(skip(self, token, cancel), fields(base = %self.base))]
    pub async fn get<R>(
        &self,
        path: &str,
        token: Option<&AccessToken>,
        cancel: &CancellationToken,
    ) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let url = self.base.endpoint_url(path);
        debug!(path, "GET");

        let request = self.authorize(self.client.get(&url), token);
        let response = self.send(request, cancel).await?;
        self.handle_response(response).await
    }

    /// POST a JSON body to an endpoint.
    #[instrument(skip(self, body, token, cancel), fields(base = %self.base))]
    pub async fn post<B, R>(
        &self,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
        cancel: &CancellationToken,
    ) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base.endpoint_url(path);
        debug!(path, "POST");

        let request = self.authorize(self.client.post(&url).json(body), token);
        let response = self.send(request, cancel).await?;
        self.handle_response(response).await
    }

    /// PATCH a JSON body to an endpoint.
    #[instrument(skip(self, body, token, cancel), fields(base = %self.base))]
    pub async fn patch<B, R>(
        &self,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
        cancel: &CancellationToken,
    ) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.base.endpoint_url(path);
        debug!(path, "PATCH");

        let request = self.authorize(self.client.patch(&url).json(body), token);
        let response = self.send(request, cancel).await?;
        self.handle_response(response).await
    }

    /// POST a multipart form, rebuilt from owned parts.
    #[instrument(skip(self, parts, token, cancel), fields(base = %self.base))]
    pub async fn post_multipart<R>(
        &self,
        path: &str,
        parts: &[UploadPart],
        token: Option<&AccessToken>,
        cancel: &CancellationToken,
    ) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let url = self.base.endpoint_url(path);
        debug!(path, part_count = parts.len(), "POST multipart");

        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            let piece = reqwest::multipart::Part::bytes(part.bytes.clone())
                .file_name(part.file_name.clone())
                .mime_str(&part.mime)
                .map_err(|e| TransportError::Http {
                    message: e.to_string(),
                })?;
            form = form.part(part.name.clone(), piece);
        }

        let request = self.authorize(self.client.post(&url).multipart(form), token);
        let response = self.send(request, cancel).await?;
        self.handle_response(response).await
    }

    /// Attach the bearer header when a token is present.
    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&AccessToken>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token.as_str())),
            None => request,
        }
    }

    /// Send a request, racing it against the cancellation token.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        tokio::select! {
            _ = cancel.cancelled() => {
                trace!("request cancelled before completion");
                Err(Error::Cancelled)
            }
            result = request.send() => result.map_err(|e| map_transport(e).into()),
        }
    }

    /// Parse the body on success, the error shape otherwise.
    async fn handle_response<R: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<R, Error> {
        let status = response.status();
        trace!(status = %status, "backend response");

        if status.is_success() {
            let body = response.json::<R>().await.map_err(map_transport)?;
            Ok(body)
        } else {
            Err(Error::Api(self.parse_error_response(response).await))
        }
    }

    /// Parse a non-2xx response into an [`ApiError`].
    async fn parse_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();

        match response.json::<ErrorBody>().await {
            Ok(body) => ApiError {
                status,
                detail: body.detail,
                code: body.error,
                non_field_errors: body.non_field_errors,
            },
            Err(_) => ApiError::new(status, None, None),
        }
    }
}

/// Map a reqwest failure into the transport taxonomy.
///
/// Anything that died before a response arrived counts as
/// "no response" for outcome normalization purposes.
pub(crate) fn map_transport(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else if err.is_request() {
        TransportError::NoResponse
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    }
}

/// Parse a deserialized JSON value out of a typed fetch.
pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| {
        Error::InvalidInput(fncr_core::error::InvalidInputError::Other {
            message: format!("unexpected response shape: {e}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let base = ApiUrl::new("https://server.fncr.com").unwrap();
        let client = HttpClient::new(base.clone());
        assert_eq!(client.base().as_str(), base.as_str());
    }
}
