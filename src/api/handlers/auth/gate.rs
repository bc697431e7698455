//! Request guard for protected routes.
//!
//! One bearer strategy is configured at startup. A request presenting that
//! strategy's credential is judged on it alone; otherwise the session cookie
//! is tried. Rejections never carry the underlying cause.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{
    codec::TokenCodec,
    federated::{JwksVerifier, KeysetStatus},
    session::extract_session_id,
    types::{ErrorResponse, MessageResponse},
    utils::{extract_authorization_token, hash_session_id, now_unix_seconds},
};
use crate::store::SessionStore;

pub const API_KEY_HEADER: &str = "x-api-key";

/// How bearer credentials are validated.
#[derive(Clone)]
pub enum BearerStrategy {
    /// HS256 tokens minted by this service.
    Local(TokenCodec),
    /// RS256 tokens minted by an identity provider.
    Federated(Arc<JwksVerifier>),
    /// A single shared key in `X-API-KEY`.
    ApiKey(SecretString),
}

impl BearerStrategy {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Federated(_) => "federated",
            Self::ApiKey(_) => "api-key",
        }
    }

    fn presented_credential(&self, headers: &HeaderMap) -> Option<String> {
        match self {
            Self::Local(_) | Self::Federated(_) => extract_authorization_token(headers),
            Self::ApiKey(_) => headers
                .get(API_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    LocalToken,
    FederatedToken,
    ApiKey,
    Session,
}

/// Who the request was accepted for, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub subject: String,
    pub method: AuthMethod,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateRejection {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("Internal server error")]
    Unavailable,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: self.to_string(),
                }),
            )
                .into_response(),
            Self::NotLoggedIn => (
                StatusCode::FORBIDDEN,
                Json(MessageResponse::new(self.to_string())),
            )
                .into_response(),
            Self::Unavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: self.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

pub struct AccessGate {
    strategy: BearerStrategy,
    sessions: Arc<dyn SessionStore>,
}

impl AccessGate {
    #[must_use]
    pub fn new(strategy: BearerStrategy, sessions: Arc<dyn SessionStore>) -> Self {
        Self { strategy, sessions }
    }

    #[must_use]
    pub fn strategy(&self) -> &BearerStrategy {
        &self.strategy
    }

    /// JWKS health for `/health`; `None` when no identity provider is used.
    pub async fn keyset_status(&self) -> Option<KeysetStatus> {
        match &self.strategy {
            BearerStrategy::Federated(verifier) => Some(verifier.status().await),
            BearerStrategy::Local(_) | BearerStrategy::ApiKey(_) => None,
        }
    }

    /// # Errors
    /// [`GateRejection::Unauthorized`] for a bad bearer credential,
    /// [`GateRejection::NotLoggedIn`] when neither credential nor session is
    /// present, [`GateRejection::Unavailable`] when the session store fails.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthOutcome, GateRejection> {
        match self.strategy.presented_credential(headers) {
            Some(credential) => self.validate_bearer(&credential).await,
            None => self.authenticate_session(headers).await,
        }
    }

    async fn validate_bearer(&self, credential: &str) -> Result<AuthOutcome, GateRejection> {
        match &self.strategy {
            BearerStrategy::Local(codec) => match codec.decode(credential, now_unix_seconds()) {
                Ok(claims) => Ok(AuthOutcome {
                    subject: claims.sub,
                    method: AuthMethod::LocalToken,
                }),
                Err(err) => {
                    debug!("local token rejected: {err}");
                    Err(GateRejection::Unauthorized)
                }
            },
            BearerStrategy::Federated(verifier) => match verifier.verify(credential).await {
                Ok(claims) => Ok(AuthOutcome {
                    subject: claims.sub.unwrap_or_default(),
                    method: AuthMethod::FederatedToken,
                }),
                Err(err) => {
                    warn!("Encountered error while validating JWT: {err}");
                    Err(GateRejection::Unauthorized)
                }
            },
            BearerStrategy::ApiKey(expected) => {
                if digest_eq(credential, expected.expose_secret()) {
                    Ok(AuthOutcome {
                        subject: "api-key".to_string(),
                        method: AuthMethod::ApiKey,
                    })
                } else {
                    debug!("api key rejected");
                    Err(GateRejection::Unauthorized)
                }
            }
        }
    }

    async fn authenticate_session(&self, headers: &HeaderMap) -> Result<AuthOutcome, GateRejection> {
        let Some(session_id) = extract_session_id(headers) else {
            return Err(GateRejection::NotLoggedIn);
        };
        match self.sessions.get_session(&hash_session_id(&session_id)).await {
            Ok(Some(record)) if !record.session_token.is_empty() => Ok(AuthOutcome {
                subject: record.username,
                method: AuthMethod::Session,
            }),
            Ok(_) => Err(GateRejection::NotLoggedIn),
            Err(err) => {
                error!("Failed to lookup session: {err:#}");
                Err(GateRejection::Unavailable)
            }
        }
    }
}

/// Compare fixed-size digests so the comparison time does not depend on how
/// much of the key matched.
fn digest_eq(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Middleware for protected routes: attaches [`AuthOutcome`] to the request
/// extensions or short-circuits with the rejection.
pub async fn require_auth(
    State(gate): State<Arc<AccessGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gate.authenticate(request.headers()).await {
        Ok(outcome) => {
            request.extensions_mut().insert(outcome);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}
