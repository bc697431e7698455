use crate::encoding::{b64d, b64e, b64e_json, split_compact};
use crate::jwks::{decode_private_key, Jwks};
use rsa::errors::Error as RsaError;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const ALG_RS256: &str = "RS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederatedHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// `aud` may be a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(value) => value == audience,
            Self::Many(values) => values.iter().any(|value| value == audience),
        }
    }
}

/// Registered claims of a provider-issued token plus the `scope` claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederatedClaims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl FederatedClaims {
    /// Whether the space-delimited `scope` claim contains `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope
            .as_deref()
            .is_some_and(|scopes| scopes.split_whitespace().any(|s| s == scope))
    }
}

/// Expectations checked after the signature.
#[derive(Debug, Clone, Copy)]
pub struct Validation<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
    /// Allowed clock skew applied to `exp`, `nbf` and `iat`.
    pub leeway_seconds: i64,
    pub now_unix_seconds: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("token header has no key id")]
    MissingKid,
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("invalid key type: {0}")]
    InvalidKeyType(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token issued in the future")]
    IssuedInFuture,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, Error> {
    let bytes = b64d(segment).ok_or(Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an RS256 signed token.
///
/// The API never mints provider tokens; this exists for fixtures and local
/// tooling that stands in for the provider.
///
/// # Errors
///
/// Returns an error if the private key cannot be parsed or the header/claims
/// cannot be encoded.
pub fn sign_rs256(
    private_key_pem_or_der: &[u8],
    kid: impl Into<String>,
    claims: &FederatedClaims,
) -> Result<String, Error> {
    let header = FederatedHeader {
        alg: ALG_RS256.to_string(),
        typ: Some("JWT".to_string()),
        kid: Some(kid.into()),
    };
    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);

    let private_key = decode_private_key(private_key_pem_or_der)?;
    let signing_key = SigningKey::<Sha256>::new(private_key);
    let signature: Signature = signing_key.sign(signing_input.as_bytes());

    Ok(format!("{signing_input}.{}", b64e(&signature.to_vec())))
}

/// Verify an RS256 token against a JWKS and return its claims.
///
/// A header without `kid` is accepted only when the set holds exactly one key.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the algorithm is not RS256 or the `kid` is unknown for the provided JWKS,
/// - the signature is invalid,
/// - the claims fail validation (`iss`, `aud`, `exp`, `nbf`, `iat`).
pub fn verify_rs256(
    token: &str,
    jwks: &Jwks,
    validation: &Validation<'_>,
) -> Result<FederatedClaims, Error> {
    let (header_b64, claims_b64, sig_b64) = split_compact(token.trim()).ok_or(Error::TokenFormat)?;

    let header: FederatedHeader = decode_segment(header_b64)?;
    if header.alg != ALG_RS256 {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let jwk = match header.kid.as_deref() {
        Some(kid) => jwks
            .find_by_kid(kid)
            .ok_or_else(|| Error::UnknownKid(kid.to_string()))?,
        None => match jwks.keys.as_slice() {
            [only] => only,
            _ => return Err(Error::MissingKid),
        },
    };

    let verifying_key = VerifyingKey::<Sha256>::new(jwk.to_rsa_public_key()?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = b64d(sig_b64).ok_or(Error::InvalidSignature)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: FederatedClaims = decode_segment(claims_b64)?;
    validate_claims(&claims, validation)?;

    Ok(claims)
}

fn validate_claims(claims: &FederatedClaims, validation: &Validation<'_>) -> Result<(), Error> {
    let now = validation.now_unix_seconds;
    let leeway = validation.leeway_seconds;

    if claims.iss != validation.issuer {
        return Err(Error::InvalidIssuer);
    }
    if !claims.aud.contains(validation.audience) {
        return Err(Error::InvalidAudience);
    }
    if claims.exp.saturating_add(leeway) <= now {
        return Err(Error::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf.saturating_sub(leeway) > now) {
        return Err(Error::NotYetValid);
    }
    if claims.iat.is_some_and(|iat| iat.saturating_sub(leeway) > now) {
        return Err(Error::IssuedInFuture);
    }
    Ok(())
}
