//! Sign-in, refresh and sign-out.
//!
//! The service owns the token codec and talks to the stores through traits, so
//! handlers stay thin and tests can run against [`crate::store::MemoryStore`].

use access_token::{Claims, TokenError};
use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use ulid::Ulid;

use super::{
    codec::TokenCodec,
    password::PasswordVerifier,
    state::AuthConfig,
    types::ErrorResponse,
    utils::{generate_session_id, hash_session_id, now_unix_seconds},
};
use crate::store::{CredentialStore, SessionRecord, SessionStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token is not expired yet")]
    RefreshNotYetDue,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::RefreshNotYetDue => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Auth operation failed: {err:#}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// A freshly minted access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Raw session identifier for the cookie; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct SignIn {
    pub access: IssuedToken,
    pub session: Option<NewSession>,
}

pub struct AuthService {
    config: AuthConfig,
    codec: TokenCodec,
    passwords: PasswordVerifier,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        codec: TokenCodec,
        passwords: PasswordVerifier,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            codec,
            passwords,
            credentials,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Unknown user and wrong password fail with the same error.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`], or [`AuthError::Internal`] when a
    /// store or the token encoder fails.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignIn, AuthError> {
        let credential = self.credentials.find_by_username(username).await?;
        let verified = self
            .passwords
            .check(
                credential.as_ref().map(|c| c.password_hash.as_str()),
                password,
            )
            .await;
        let Some(credential) = credential.filter(|_| verified) else {
            warn!("sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let now = now_unix_seconds();
        let access = self.issue(&credential.username, now, self.config.access_token_ttl_seconds())?;

        let session = if self.config.sessions_enabled() {
            Some(self.create_session(&credential.username).await?)
        } else {
            None
        };

        info!(session = session.is_some(), "signed in");
        Ok(SignIn { access, session })
    }

    /// # Errors
    /// See [`AuthService::refresh_at`].
    pub fn refresh(&self, token: &str) -> Result<IssuedToken, AuthError> {
        self.refresh_at(token, now_unix_seconds())
    }

    /// Reissue an authentic token that has expired or is inside the grace
    /// window. The password is not checked again.
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] for a tampered or malformed token,
    /// [`AuthError::RefreshNotYetDue`] when it still has longer than the grace
    /// window to live.
    pub fn refresh_at(&self, token: &str, now: i64) -> Result<IssuedToken, AuthError> {
        let claims = match self.codec.decode(token, now) {
            Ok(claims) => {
                if claims.seconds_remaining(now) > self.config.refresh_grace_seconds() {
                    return Err(AuthError::RefreshNotYetDue);
                }
                claims
            }
            Err(TokenError::Expired(claims)) => claims,
            Err(err) => {
                warn!("refresh rejected: {err}");
                return Err(AuthError::InvalidToken);
            }
        };

        let access = self.issue(&claims.sub, now, self.config.refresh_extension_seconds())?;
        info!(subject = %claims.sub, "token refreshed");
        Ok(access)
    }

    /// Delete the session behind `session_id`, if any. Signing out twice is
    /// not an error. Access tokens stay valid until they expire.
    ///
    /// # Errors
    /// [`AuthError::Internal`] when the session store fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, session_id: Option<&str>) -> Result<(), AuthError> {
        if let Some(session_id) = session_id {
            self.sessions
                .delete_session(&hash_session_id(session_id))
                .await?;
        }
        info!("signed out");
        Ok(())
    }

    fn issue(&self, subject: &str, now: i64, ttl_seconds: i64) -> Result<IssuedToken, AuthError> {
        let claims = Claims::new(subject, now, ttl_seconds);
        let token = self
            .codec
            .encode(&claims)
            .context("failed to sign access token")?;
        Ok(IssuedToken { token, claims })
    }

    async fn create_session(&self, username: &str) -> Result<NewSession, AuthError> {
        let session_id = generate_session_id()?;
        let record = SessionRecord {
            username: username.to_string(),
            session_token: Ulid::new().to_string(),
        };
        let ttl = Duration::from_secs(u64::try_from(self.config.session_ttl_seconds()).unwrap_or(0));
        self.sessions
            .create_session(&hash_session_id(&session_id), &record, ttl)
            .await?;
        Ok(NewSession { session_id })
    }
}
