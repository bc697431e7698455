//! HS256 access tokens bound to the process signing secret.

use access_token::{decode_hs256, encode_hs256, Claims, TokenError};
use secrecy::{ExposeSecret, SecretString};

#[derive(Clone)]
pub struct TokenCodec {
    secret: SecretString,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// # Errors
    /// Returns [`TokenError::InvalidKey`] when the secret is empty.
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode_hs256(claims, self.secret.expose_secret().as_bytes())
    }

    /// Signature is checked before expiry, so an expired but authentic token
    /// comes back as [`TokenError::Expired`] carrying its claims.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn decode(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, TokenError> {
        decode_hs256(token, self.secret.expose_secret().as_bytes(), now_unix_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trips_and_rejects_other_secret() -> Result<(), TokenError> {
        let codec = TokenCodec::new(SecretString::from("eUbP9shywUygMx7u".to_string()));
        let other = TokenCodec::new(SecretString::from("another-secret".to_string()));
        let claims = Claims::new("admin", 1_000, 600);

        let token = codec.encode(&claims)?;
        assert_eq!(codec.decode(&token, 1_100)?, claims);
        assert!(matches!(
            other.decode(&token, 1_100),
            Err(TokenError::InvalidSignature)
        ));
        assert!(matches!(
            codec.decode(&token, 1_600),
            Err(TokenError::Expired(expired)) if expired == claims
        ));
        Ok(())
    }

    #[test]
    fn debug_hides_secret() {
        let codec = TokenCodec::new(SecretString::from("super-secret".to_string()));
        assert!(!format!("{codec:?}").contains("super-secret"));
    }
}
