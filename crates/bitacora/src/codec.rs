//! Unverified bearer token decoding.
//!
//! [`TokenCodec`] reads the payload segment of a `header.payload.signature`
//! token. The signature is never checked, so the claims are good for
//! display and expiry hints only. They are not a trust boundary.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, a username or a numeric user id depending on the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<serde_json::Value>,
    /// User id; the backend emits numbers or strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Stateless decoder for bearer tokens.
///
/// Every operation fails soft: malformed input yields `None` or, for the
/// expiry checks, "expired".
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCodec;

impl TokenCodec {
    /// Decode the payload segment, or `None` if the token is malformed.
    pub fn decode(token: &str) -> Option<Claims> {
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            trace!("token does not have three segments");
            return None;
        };

        let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(e) => {
                trace!(error = %e, "token payload is not base64url");
                return None;
            }
        };

        match serde_json::from_slice::<Claims>(&bytes) {
            Ok(claims) => Some(claims),
            Err(e) => {
                trace!(error = %e, "token payload is not a JSON object");
                None
            }
        }
    }

    /// The `exp` claim in epoch seconds, if the token decodes and has one.
    pub fn expiration(token: &str) -> Option<i64> {
        Self::decode(token).and_then(|claims| claims.exp)
    }

    /// Whether the token is expired now.
    ///
    /// Malformed tokens and tokens without `exp` count as expired.
    pub fn is_expired(token: &str) -> bool {
        Self::is_expired_at(token, Utc::now().timestamp())
    }

    /// Whether the token is expired at `now` (epoch seconds).
    pub fn is_expired_at(token: &str, now: i64) -> bool {
        match Self::expiration(token) {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    /// Whether a decodable `exp` falls within `leeway_secs` from now.
    ///
    /// Unlike [`is_expired`](Self::is_expired) this is `false` for tokens
    /// without a readable expiry, so opaque tokens are left to the server.
    pub fn expires_within(token: &str, leeway_secs: i64) -> bool {
        Self::expiration(token).is_some_and(|exp| exp <= Utc::now().timestamp() + leeway_secs)
    }
}
