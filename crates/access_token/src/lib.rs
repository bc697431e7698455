//! Compact signed tokens for the recipes API.
//!
//! Two token families live here:
//!
//! - **HS256 access tokens** minted by the API itself at sign-in and refresh.
//!   Validity is self-contained: a shared secret and the embedded expiry.
//! - **RS256 tokens** issued by an external identity provider and verified
//!   against its published JWKS.
//!
//! Both use the three-part `header.payload.signature` layout with base64url
//! (unpadded) segments.

mod encoding;
mod hs256;
mod jwks;
mod rs256;

pub use hs256::{decode_hs256, encode_hs256, Claims, TokenError, ALG_HS256};
pub use jwks::{Jwk, Jwks};
pub use rs256::{
    sign_rs256, verify_rs256, Audience, Error, FederatedClaims, FederatedHeader, Validation,
};
