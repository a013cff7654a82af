//! Expiry-claim decoding for access tokens.
//!
//! Access tokens are opaque bearer credentials except for one thing:
//! the embedded `exp` claim, which is decoded once at the moment a
//! token is received so that expiry checks never need to re-parse it.
//! No signature verification happens here; the backend owns validity.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, InvalidInputError};

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Decode the `exp` claim of a JWT and return it as epoch milliseconds.
///
/// # Errors
///
/// Returns [`InvalidInputError::Claims`] if the token is not a
/// three-segment JWT, the payload is not valid base64url/JSON, or the
/// `exp` claim is missing.
pub fn decode_expiry_ms(token: &str) -> Result<i64, Error> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| invalid("not a three-segment JWT"))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| invalid(&format!("payload is not base64url: {e}")))?;

    let claim: ExpiryClaim = serde_json::from_slice(&bytes)
        .map_err(|e| invalid(&format!("payload has no usable exp claim: {e}")))?;

    Ok(claim.exp * 1000)
}

fn invalid(reason: &str) -> Error {
    Error::InvalidInput(InvalidInputError::Claims {
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unsigned JWT with the given payload JSON.
    fn forge_jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn decodes_exp_claim_to_milliseconds() {
        let jwt = forge_jwt(&serde_json::json!({ "exp": 1_700_000_000, "sub": "42" }));
        assert_eq!(decode_expiry_ms(&jwt).unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn rejects_token_without_payload_segment() {
        assert!(decode_expiry_ms("justonesegment").is_err());
    }

    #[test]
    fn rejects_payload_without_exp() {
        let jwt = forge_jwt(&serde_json::json!({ "sub": "42" }));
        assert!(decode_expiry_ms(&jwt).is_err());
    }

    #[test]
    fn rejects_non_base64_payload() {
        assert!(decode_expiry_ms("a.!!!not-base64!!!.c").is_err());
    }
}
