//! Small helpers for session identifiers, header parsing and timestamps.

use anyhow::{Context, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::time::SystemTime;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const BEARER_SCHEME: &str = "Bearer";

/// Create a new session identifier for the auth cookie.
/// The raw value is only returned to set the cookie; the store keeps a hash.
pub(crate) fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session id")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session identifier so raw values never touch the store.
pub(crate) fn hash_session_id(session_id: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.finalize().to_vec()
}

/// Token carried in `Authorization`, with or without the `Bearer` scheme.
/// The scheme matches case-insensitively; a bare scheme is no token.
pub(crate) fn extract_authorization_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = match value.get(..BEARER_SCHEME.len()) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case(BEARER_SCHEME)
                && value[BEARER_SCHEME.len()..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace) =>
        {
            value[BEARER_SCHEME.len()..].trim()
        }
        _ => value,
    };
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Unix seconds for token expiry checks.
pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Render a unix timestamp as RFC 3339 for API responses.
pub(crate) fn rfc3339_from_unix(unix_seconds: i64) -> Result<String> {
    let dt = OffsetDateTime::from_unix_timestamp(unix_seconds)
        .context("timestamp out of range")?;
    dt.format(&Rfc3339).context("failed to format timestamp")
}
