use crate::encoding::{b64d, b64d_json, b64e, b64e_json, split_compact};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const ALG_HS256: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs256() -> Self {
        Self {
            alg: ALG_HS256.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Subject identity plus issue/expiry instants (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn new(subject: impl Into<String>, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: subject.into(),
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_seconds),
        }
    }

    /// Seconds left before `exp`; negative once expired.
    #[must_use]
    pub fn seconds_remaining(&self, now_unix_seconds: i64) -> i64 {
        self.exp.saturating_sub(now_unix_seconds)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    /// Signature checked out but `exp` has passed. Carries the claims so
    /// callers can act on a stale but authentic token.
    #[error("token expired")]
    Expired(Claims),
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signing key")]
    InvalidKey,
}

fn keyed_mac(secret: &[u8], signing_input: &str) -> Result<HmacSha256, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::InvalidKey);
    }
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Create an HS256 signed access token.
///
/// The output only depends on `claims` and `secret`.
///
/// # Errors
///
/// Returns an error if the secret is empty or the claims cannot be encoded.
pub fn encode_hs256(claims: &Claims, secret: &[u8]) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&Header::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature = keyed_mac(secret, &signing_input)?.finalize().into_bytes();

    Ok(format!("{signing_input}.{}", b64e(&signature)))
}

/// Verify an HS256 access token and return its claims.
///
/// The signature is checked before anything in the header or payload is
/// trusted, so an altered token reports [`TokenError::InvalidSignature`] and
/// never [`TokenError::Expired`].
///
/// # Errors
///
/// - [`TokenError::Malformed`] when the token does not have three segments or
///   an authentic token carries an unexpected header/payload,
/// - [`TokenError::InvalidSignature`] when the signature does not match,
/// - [`TokenError::Expired`] when `exp <= now_unix_seconds`.
pub fn decode_hs256(token: &str, secret: &[u8], now_unix_seconds: i64) -> Result<Claims, TokenError> {
    let (header_b64, claims_b64, sig_b64) =
        split_compact(token.trim()).ok_or(TokenError::Malformed)?;

    let signature = b64d(sig_b64).ok_or(TokenError::InvalidSignature)?;
    keyed_mac(secret, &format!("{header_b64}.{claims_b64}"))?
        .verify_slice(&signature)
        .map_err(|_| TokenError::InvalidSignature)?;

    let header: Header = b64d_json(header_b64).ok_or(TokenError::Malformed)?;
    if header.alg != ALG_HS256 {
        return Err(TokenError::Malformed);
    }

    let claims: Claims = b64d_json(claims_b64).ok_or(TokenError::Malformed)?;
    if claims.exp <= now_unix_seconds {
        return Err(TokenError::Expired(claims));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"eUbP9shywUygMx7u";
    const NOW: i64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims::new("admin", NOW, 600)
    }

    fn signature_segment(token: &str) -> Result<&str, TokenError> {
        token.rsplit('.').next().ok_or(TokenError::Malformed)
    }

    #[test]
    fn encode_then_decode_returns_same_claims() -> Result<(), TokenError> {
        let token = encode_hs256(&claims(), SECRET)?;
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode_hs256(&token, SECRET, NOW)?;
        assert_eq!(decoded, claims());
        assert_eq!(decoded.exp, NOW + 600);
        Ok(())
    }

    #[test]
    fn encode_is_deterministic() -> Result<(), TokenError> {
        assert_eq!(encode_hs256(&claims(), SECRET)?, encode_hs256(&claims(), SECRET)?);
        Ok(())
    }

    #[test]
    fn altered_signature_is_invalid_signature_not_expired() -> Result<(), TokenError> {
        // Expired on purpose: tampering must win over staleness.
        let token = encode_hs256(&claims(), SECRET)?;
        let sig = signature_segment(&token)?;
        let prefix_len = token.len() - sig.len();

        for (index, original) in sig.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut altered = token.clone();
            altered.replace_range(
                prefix_len + index..prefix_len + index + 1,
                &replacement.to_string(),
            );
            let result = decode_hs256(&altered, SECRET, NOW + 9_999);
            assert!(
                matches!(result, Err(TokenError::InvalidSignature)),
                "index {index}: {result:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn swapped_payload_is_invalid_signature() -> Result<(), TokenError> {
        let token = encode_hs256(&claims(), SECRET)?;
        let forged = encode_hs256(&Claims::new("root", NOW, 600), SECRET)?;

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = forged.split('.').nth(1).ok_or(TokenError::Malformed)?;
        parts[1] = forged_payload;

        let result = decode_hs256(&parts.join("."), SECRET, NOW);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn wrong_secret_is_invalid_signature() -> Result<(), TokenError> {
        let token = encode_hs256(&claims(), SECRET)?;
        let result = decode_hs256(&token, b"another-secret", NOW);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn past_expiry_is_expired_with_claims() -> Result<(), TokenError> {
        let token = encode_hs256(&claims(), SECRET)?;

        match decode_hs256(&token, SECRET, NOW + 601) {
            Err(TokenError::Expired(expired)) => assert_eq!(expired, claims()),
            other => panic!("expected Expired, got {other:?}"),
        }

        // exp itself is already stale
        assert!(matches!(
            decode_hs256(&token, SECRET, NOW + 600),
            Err(TokenError::Expired(_))
        ));
        assert!(decode_hs256(&token, SECRET, NOW + 599).is_ok());
        Ok(())
    }

    #[test]
    fn structural_garbage_is_malformed() {
        for token in ["", "not-a-token", "only.two", ".payload.sig"] {
            assert!(
                matches!(decode_hs256(token, SECRET, NOW), Err(TokenError::Malformed)),
                "{token}"
            );
        }
    }

    #[test]
    fn authentic_token_with_foreign_alg_is_malformed() -> Result<(), TokenError> {
        let header = b64e_json(&Header {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let payload = b64e_json(&claims())?;
        let signing_input = format!("{header}.{payload}");
        let signature = keyed_mac(SECRET, &signing_input)?.finalize().into_bytes();
        let token = format!("{signing_input}.{}", b64e(&signature));

        assert!(matches!(
            decode_hs256(&token, SECRET, NOW),
            Err(TokenError::Malformed)
        ));
        Ok(())
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            encode_hs256(&claims(), b""),
            Err(TokenError::InvalidKey)
        ));
    }

    #[test]
    fn seconds_remaining_counts_down() {
        let claims = claims();
        assert_eq!(claims.seconds_remaining(NOW), 600);
        assert_eq!(claims.seconds_remaining(NOW + 610), -10);
    }
}
