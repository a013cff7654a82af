//! Backend API base URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// A validated backend API base URL.
///
/// Base URLs must use HTTPS, or HTTP when pointing at localhost (for
/// local development and tests against a mock backend).
///
/// # Example
///
/// ```
/// use fncr_core::ApiUrl;
///
/// let base = ApiUrl::new("https://server.fncr.com").unwrap();
/// assert_eq!(
///     base.endpoint_url("api/users/me/"),
///     "https://server.fncr.com/api/users/me/"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Create a new API URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not absolute, lacks a host, or
    /// uses a non-HTTPS scheme outside localhost.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ApiUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        // Normalize: remove trailing slash
        let normalized = if url.path() == "/" {
            let mut u = url.clone();
            u.set_path("");
            u
        } else {
            url
        };

        Ok(Self(normalized))
    }

    /// Returns the full URL for an endpoint path.
    pub fn endpoint_url(&self, path: &str) -> String {
        // The URL crate always adds a trailing slash to root paths,
        // so trim before joining the endpoint path
        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        if url.cannot_be_a_base() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must be an absolute URL".to_string(),
            }
            .into());
        }

        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "::1");

        let scheme = url.scheme();
        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must use HTTPS (HTTP allowed only for localhost)".to_string(),
            }
            .into());
        }

        if url.host_str().is_none() {
            return Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: "must have a host".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ApiUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ApiUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ApiUrl::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https() {
        let url = ApiUrl::new("https://server.fncr.com").unwrap();
        assert_eq!(url.host(), Some("server.fncr.com"));
    }

    #[test]
    fn accepts_http_localhost() {
        assert!(ApiUrl::new("http://127.0.0.1:8080").is_ok());
        assert!(ApiUrl::new("http://localhost:3000").is_ok());
    }

    #[test]
    fn rejects_http_remote() {
        assert!(ApiUrl::new("http://server.fncr.com").is_err());
    }

    #[test]
    fn rejects_relative() {
        assert!(ApiUrl::new("not a url").is_err());
    }

    #[test]
    fn endpoint_url_joins_paths() {
        let url = ApiUrl::new("https://server.fncr.com/").unwrap();
        assert_eq!(
            url.endpoint_url("/api/users/request-otp/"),
            "https://server.fncr.com/api/users/request-otp/"
        );
    }
}
