use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::error::Error;

/// Which of the two bearer tokens a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Token issued by the identity provider at sign-in.
    Identity,
    /// Token issued by the portal backend after verification.
    Backend,
}

impl TokenKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Backend => "backend",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims read from a token body without checking its signature.
///
/// Only good for local bookkeeping such as expiry tracking. The backend is
/// the authority on whether a token is genuine.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims {
    inner: JsonValue,
}

impl UnverifiedClaims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets the inner JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    /// The `exp` claim as a timestamp.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedToken` if `exp` is missing or not a valid
    /// unix timestamp.
    pub fn expires_at(&self) -> Result<OffsetDateTime, Error> {
        let exp = self
            .inner
            .get("exp")
            .ok_or_else(|| Error::MalformedToken("missing claim: exp".into()))?;
        // Some issuers emit fractional seconds.
        let secs = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| Error::MalformedToken("exp is not a number".into()))?;
        OffsetDateTime::from_unix_timestamp(secs)
            .map_err(|e| Error::MalformedToken(format!("exp out of range: {e}")))
    }
}

/// Decodes the payload segment of a three-segment token.
///
/// # Errors
///
/// Returns `Error::MalformedToken` if the token does not have exactly three
/// dot-separated segments, or its payload is not base64url-encoded JSON.
pub fn decode_unverified(token: &str) -> Result<UnverifiedClaims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, got {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| Error::MalformedToken(format!("invalid payload encoding: {e}")))?;

    let inner: JsonValue = serde_json::from_slice(&payload)
        .map_err(|e| Error::MalformedToken(format!("invalid payload JSON: {e}")))?;
    if !inner.is_object() {
        return Err(Error::MalformedToken("payload is not an object".into()));
    }

    Ok(UnverifiedClaims { inner })
}

/// Reads a token's expiry.
///
/// # Errors
///
/// Returns `Error::MalformedToken` if the token cannot be decoded or has no
/// usable `exp` claim.
pub fn token_expiry(token: &str) -> Result<OffsetDateTime, Error> {
    decode_unverified(token)?.expires_at()
}

/// Whether a token's `exp` is at or before `now`.
///
/// # Errors
///
/// Returns `Error::MalformedToken` when the expiry cannot be read.
pub fn is_expired(token: &str, now: OffsetDateTime) -> Result<bool, Error> {
    Ok(token_expiry(token)? <= now)
}
