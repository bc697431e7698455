//! Verification of access tokens issued by an external identity provider.
//!
//! Keys come from the provider's JWKS, located through its OpenID discovery
//! document. The keyset is cached in memory and refreshed when stale or when a
//! token names a key id we have not seen. A failed refresh keeps the last good
//! keyset.
//!
//! Only one refresh runs at a time, and attempts (failed ones included) are
//! spaced by a cooldown, so a slow or unreachable provider costs at most one
//! fetch per cooldown window rather than one per request.

use access_token::{verify_rs256, Error as JwtError, FederatedClaims, Jwks, Validation};
use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{ETAG, IF_NONE_MATCH},
    Client, StatusCode,
};
use serde::Deserialize;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, info_span, warn, Instrument};
use url::Url;

use super::utils::now_unix_seconds;

pub const DEFAULT_JWKS_CACHE_SECONDS: u64 = 300;
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 30;
pub const KEYSET_REFRESH_COOLDOWN_SECONDS: u64 = 30;
const FETCH_TIMEOUT_SECONDS: u64 = 5;
const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// Extra claim checks run after signature and standard claims pass.
pub trait ClaimValidator: Send + Sync + fmt::Debug {
    /// # Errors
    /// Returns a short reason when the claims are not acceptable.
    fn validate(&self, claims: &FederatedClaims) -> Result<(), String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllClaims;

impl ClaimValidator for AcceptAllClaims {
    fn validate(&self, _claims: &FederatedClaims) -> Result<(), String> {
        Ok(())
    }
}

/// Requires one entry in the space-delimited `scope` claim.
#[derive(Debug, Clone)]
pub struct RequireScope(pub String);

impl ClaimValidator for RequireScope {
    fn validate(&self, claims: &FederatedClaims) -> Result<(), String> {
        if claims.has_scope(&self.0) {
            Ok(())
        } else {
            Err(format!("missing scope {}", self.0))
        }
    }
}

#[derive(Debug, Error)]
pub enum FederatedError {
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("claims rejected: {0}")]
    Claims(String),
    #[error("token has no subject")]
    MissingSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysetStatus {
    /// Provider reachable and keyset fetched.
    Ok,
    /// Provider unreachable or keyset invalid.
    Error,
    /// Fixed keyset, no provider.
    Static,
}

impl KeysetStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Static => "static",
        }
    }

    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Error)
    }
}

/// Who issued the tokens and how strictly to check them.
#[derive(Debug, Clone)]
pub struct FederatedConfig {
    pub issuer: String,
    pub audience: String,
    pub clock_skew_seconds: i64,
    pub cache_ttl: Duration,
    /// Minimum spacing between two fetch attempts.
    pub refresh_cooldown: Duration,
    pub claims: Arc<dyn ClaimValidator>,
}

impl FederatedConfig {
    #[must_use]
    pub fn new(issuer: String, audience: String) -> Self {
        Self {
            issuer,
            audience,
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_SECONDS),
            refresh_cooldown: Duration::from_secs(KEYSET_REFRESH_COOLDOWN_SECONDS),
            claims: Arc::new(AcceptAllClaims),
        }
    }

    #[must_use]
    pub fn with_clock_skew_seconds(mut self, seconds: i64) -> Self {
        self.clock_skew_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_claim_validator(mut self, claims: Arc<dyn ClaimValidator>) -> Self {
        self.claims = claims;
        self
    }
}

#[derive(Debug)]
enum KeysetSource {
    Static,
    Remote { discovery_url: String, client: Client },
}

#[derive(Debug, Clone)]
struct KeysetCache {
    jwks: Jwks,
    /// `None` until the first successful fetch.
    fetched_at: Option<Instant>,
    etag: Option<String>,
    ttl: Duration,
}

impl KeysetCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| fetched_at.elapsed() < self.ttl)
    }
}

/// Outcome of the latest fetch attempt. Guarded by a mutex that is held for
/// the whole fetch, which makes refreshes single-flight.
#[derive(Debug, Default)]
struct RefreshState {
    attempted_at: Option<Instant>,
    succeeded: bool,
}

#[derive(Debug)]
pub struct JwksVerifier {
    source: KeysetSource,
    cache: RwLock<KeysetCache>,
    config: FederatedConfig,
    refresh: Mutex<RefreshState>,
    /// Bumped after every attempt; lets waiters see that someone else fetched.
    attempts: AtomicU64,
}

#[derive(Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// `{issuer}/.well-known/openid-configuration`, keeping any issuer path.
///
/// # Errors
/// Returns an error if the issuer is not an absolute http(s) URL.
pub fn discovery_url(issuer: &str) -> Result<String> {
    let mut base = Url::parse(issuer).context("Invalid identity provider issuer URL")?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(anyhow!("Identity provider issuer must be http(s): {issuer}"));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(DISCOVERY_PATH)?.to_string())
}

impl JwksVerifier {
    /// Verifier over a fixed keyset that is never refreshed.
    #[must_use]
    pub fn with_static_keyset(jwks: Jwks, config: FederatedConfig) -> Self {
        Self {
            source: KeysetSource::Static,
            cache: RwLock::new(KeysetCache {
                jwks,
                fetched_at: Some(Instant::now()),
                etag: None,
                ttl: config.cache_ttl,
            }),
            config,
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Verifier that discovers and fetches the provider's JWKS.
    ///
    /// # Errors
    /// Returns an error if the issuer URL is invalid or the HTTP client cannot
    /// be built. An unreachable provider is not an error here.
    pub async fn new_remote(config: FederatedConfig) -> Result<Self> {
        let discovery_url = discovery_url(&config.issuer)?;
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build JWKS HTTP client")?;

        let verifier = Self {
            source: KeysetSource::Remote {
                discovery_url,
                client,
            },
            cache: RwLock::new(KeysetCache {
                jwks: Jwks::default(),
                fetched_at: None,
                etag: None,
                ttl: config.cache_ttl,
            }),
            config,
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        };

        // Best-effort: an empty cache fails closed until a refresh works.
        if let Err(err) = verifier.refresh_if_due().await {
            warn!(
                issuer = %verifier.config.issuer,
                error = %err,
                "JWKS fetch failed during startup; continuing with empty keyset"
            );
        }
        Ok(verifier)
    }

    /// Cached keyset; refreshed first when stale, falling back to the cached copy.
    async fn keyset_snapshot(&self) -> Jwks {
        let fresh = self.cache.read().await.is_fresh();
        if !fresh && !matches!(self.source, KeysetSource::Static) {
            if let Err(err) = self.refresh_if_due().await {
                warn!(
                    issuer = %self.config.issuer,
                    error = %err,
                    "failed to refresh JWKS cache"
                );
            }
        }
        self.cache.read().await.jwks.clone()
    }

    /// Fetch the keyset unless another caller just did or the last attempt is
    /// within the cooldown. Returns whether this call fetched.
    async fn refresh_if_due(&self) -> Result<bool> {
        if matches!(self.source, KeysetSource::Static) {
            return Ok(false);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.refresh.lock().await;
        if self.attempts.load(Ordering::Acquire) != seen {
            // A refresh finished while we waited for the lock.
            return Ok(false);
        }
        if state
            .attempted_at
            .is_some_and(|at| at.elapsed() < self.config.refresh_cooldown)
        {
            return Ok(false);
        }

        state.attempted_at = Some(Instant::now());
        let result = self.refresh_keyset().await;
        state.succeeded = result.is_ok();
        self.attempts.fetch_add(1, Ordering::Release);
        result.map(|()| true)
    }

    async fn refresh_keyset(&self) -> Result<()> {
        let (discovery_url, client) = match &self.source {
            KeysetSource::Static => return Ok(()),
            KeysetSource::Remote {
                discovery_url,
                client,
            } => (discovery_url.as_str(), client),
        };
        let etag = self.cache.read().await.etag.clone();

        let jwks_url = fetch_jwks_uri(client, discovery_url).await?;
        match fetch_keyset(client, &jwks_url, etag.as_deref()).await? {
            FetchOutcome::NotModified => {
                self.cache.write().await.fetched_at = Some(Instant::now());
            }
            FetchOutcome::Updated { jwks, etag } => {
                let mut cache = self.cache.write().await;
                cache.jwks = jwks;
                cache.fetched_at = Some(Instant::now());
                cache.etag = etag;
                info!(keyset_keys = cache.jwks.keys.len(), "JWKS cache refreshed");
            }
        }
        Ok(())
    }

    /// Health view of the provider dependency. Only hits the network when the
    /// cache is stale and the cooldown allows it; otherwise reports the
    /// latest attempt.
    pub async fn status(&self) -> KeysetStatus {
        if matches!(self.source, KeysetSource::Static) {
            return KeysetStatus::Static;
        }
        if self.cache.read().await.is_fresh() {
            return KeysetStatus::Ok;
        }
        match self.refresh_if_due().await {
            Ok(true) => KeysetStatus::Ok,
            Ok(false) => {
                if self.refresh.lock().await.succeeded {
                    KeysetStatus::Ok
                } else {
                    KeysetStatus::Error
                }
            }
            Err(err) => {
                warn!(
                    issuer = %self.config.issuer,
                    error = %err,
                    "JWKS fetch failed during health check"
                );
                KeysetStatus::Error
            }
        }
    }

    /// Verify signature, issuer, audience and time claims, then the configured
    /// claim validator. Returns the claims with a guaranteed subject.
    ///
    /// # Errors
    /// Returns the first failed check.
    pub async fn verify(&self, token: &str) -> Result<FederatedClaims, FederatedError> {
        let jwks = self.keyset_snapshot().await;
        let claims = match self.verify_with(token, &jwks) {
            Err(FederatedError::Token(JwtError::UnknownKid(kid))) => {
                match self.refresh_if_due().await {
                    // Also covers a refresh finished by a concurrent caller.
                    Ok(_) => {
                        let jwks = self.cache.read().await.jwks.clone();
                        self.verify_with(token, &jwks)?
                    }
                    Err(err) => {
                        warn!(
                            issuer = %self.config.issuer,
                            error = %err,
                            "JWKS refresh for unknown kid failed"
                        );
                        return Err(JwtError::UnknownKid(kid).into());
                    }
                }
            }
            other => other?,
        };

        if claims.sub.as_deref().map_or(true, str::is_empty) {
            return Err(FederatedError::MissingSubject);
        }
        self.config
            .claims
            .validate(&claims)
            .map_err(FederatedError::Claims)?;
        Ok(claims)
    }

    fn verify_with(&self, token: &str, jwks: &Jwks) -> Result<FederatedClaims, FederatedError> {
        let validation = Validation {
            issuer: &self.config.issuer,
            audience: &self.config.audience,
            leeway_seconds: self.config.clock_skew_seconds,
            now_unix_seconds: now_unix_seconds(),
        };
        Ok(verify_rs256(token, jwks, &validation)?)
    }
}

enum FetchOutcome {
    NotModified,
    Updated { jwks: Jwks, etag: Option<String> },
}

async fn fetch_jwks_uri(client: &Client, discovery_url: &str) -> Result<String> {
    let span = info_span!("idp.discovery.fetch", http.method = "GET", url = %discovery_url);
    async {
        let response = client.get(discovery_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("discovery fetch failed: {status}"));
        }
        let document: DiscoveryDocument = response
            .json()
            .await
            .context("Invalid discovery document")?;
        Ok(document.jwks_uri)
    }
    .instrument(span)
    .await
}

async fn fetch_keyset(client: &Client, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
    let span = info_span!("idp.jwks.fetch", http.method = "GET", url = %url);
    async {
        let mut request = client.get(url);
        if let Some(etag_value) = etag {
            request = request.header(IF_NONE_MATCH, etag_value);
        }
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("JWKS fetch failed: {status}"));
        }

        let jwks = Jwks::from_json(&body).context("Invalid JWKS JSON")?;
        Ok(FetchOutcome::Updated { jwks, etag })
    }
    .instrument(span)
    .await
}
