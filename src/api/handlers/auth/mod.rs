//! Authentication: sign-in, refresh, sign-out and the access gate.
//!
//! ## Tokens
//!
//! Access tokens are HS256 with a shared process secret. Sign-in issues one
//! for ten minutes. Refresh reissues one for five minutes, but only for an
//! authentic token that has expired or has at most 30 seconds left.
//!
//! ## Sessions
//!
//! With sessions enabled, sign-in also sets a `recipes_api` cookie holding a
//! random identifier. The store keys the session by the SHA-256 of that
//! identifier. Sign-out deletes the session and clears the cookie; access
//! tokens already handed out stay valid until they expire.

mod codec;
pub mod federated;
mod gate;
mod password;
pub(crate) mod refresh;
mod service;
pub(crate) mod session;
pub(crate) mod signin;
mod state;
pub(crate) mod types;
mod utils;

pub use codec::TokenCodec;
pub use federated::{
    AcceptAllClaims, ClaimValidator, FederatedConfig, JwksVerifier, KeysetStatus, RequireScope,
};
pub use gate::{
    require_auth, AccessGate, AuthMethod, AuthOutcome, BearerStrategy, GateRejection,
    API_KEY_HEADER,
};
pub use password::{hash_password, verify_password, PasswordVerifier, DEFAULT_BCRYPT_COST};
pub use service::{AuthError, AuthService, IssuedToken, NewSession, SignIn};
pub use session::SESSION_COOKIE_NAME;
pub use state::AuthConfig;
