use crate::{
    api::{
        self,
        handlers::auth::{
            AccessGate, AuthConfig, AuthService, BearerStrategy, FederatedConfig, JwksVerifier,
            PasswordVerifier, RequireScope, TokenCodec,
        },
        Services,
    },
    cli::commands::idp::Strategy,
    store::PgStore,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_dsn: String,
    pub jwt_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_extension_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub sessions: bool,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub bcrypt_cost: u32,
    pub strategy: Strategy,
}

pub(crate) async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .with_context(|| format!("Failed to connect to database {}", redact_dsn(dsn)))
}

/// Execute the server action.
/// # Errors
/// Returns an error if a database is unreachable, the identity provider
/// configuration is invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = PgStore::new(connect(&args.dsn).await?);
    store.ensure_schema().await?;

    let session_store = if args.session_dsn == args.dsn {
        store.clone()
    } else {
        PgStore::new(connect(&args.session_dsn).await?)
    };
    session_store.ensure_session_schema().await?;

    let config = AuthConfig::new()
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_extension_seconds(args.refresh_extension_seconds)
        .with_refresh_grace_seconds(args.refresh_grace_seconds)
        .with_sessions(args.sessions)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_cookie_secure(args.session_cookie_secure);

    let codec = TokenCodec::new(args.jwt_secret);
    let strategy = bearer_strategy(args.strategy, &codec).await?;

    let store = Arc::new(store);
    let session_store = Arc::new(session_store);

    let auth = Arc::new(AuthService::new(
        config,
        codec,
        PasswordVerifier::new(args.bcrypt_cost)?,
        store.clone(),
        session_store.clone(),
    ));
    let gate = Arc::new(AccessGate::new(strategy, session_store));
    debug!(strategy = gate.strategy().name(), "access gate ready");

    let services = Services {
        auth,
        gate,
        recipes: store.clone(),
        health: store,
    };

    api::serve(args.port, api::router(services)).await
}

async fn bearer_strategy(strategy: Strategy, codec: &TokenCodec) -> Result<BearerStrategy> {
    Ok(match strategy {
        Strategy::Local => BearerStrategy::Local(codec.clone()),
        Strategy::Federated {
            issuer,
            audience,
            clock_skew_seconds,
            jwks_cache_seconds,
            required_scope,
        } => {
            let mut config = FederatedConfig::new(issuer, audience)
                .with_clock_skew_seconds(clock_skew_seconds)
                .with_cache_ttl(Duration::from_secs(jwks_cache_seconds));
            if let Some(scope) = required_scope {
                config = config.with_claim_validator(Arc::new(RequireScope(scope)));
            }
            let verifier = JwksVerifier::new_remote(config)
                .await
                .context("Invalid identity provider configuration")?;
            BearerStrategy::Federated(Arc::new(verifier))
        }
        Strategy::ApiKey(key) => BearerStrategy::ApiKey(key),
    })
}

fn log_startup_args(args: &Args) {
    let strategy = match &args.strategy {
        Strategy::Local => "local".to_string(),
        Strategy::Federated {
            issuer, audience, ..
        } => format!("federated (iss={issuer}, aud={audience})"),
        Strategy::ApiKey(_) => "api-key".to_string(),
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("session_dsn", redact_dsn(&args.session_dsn)),
        ("token_strategy", strategy),
        (
            "access_token_ttl_seconds",
            args.access_token_ttl_seconds.to_string(),
        ),
        ("sessions", args.sessions.to_string()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("bcrypt_cost", args.bcrypt_cost.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_dsn_hides_password() {
        assert_eq!(
            redact_dsn("postgres://recipes:hunter2@db:5432/recipes"),
            "postgres://recipes:REDACTED@db:5432/recipes"
        );
        assert_eq!(
            redact_dsn("postgres://recipes@db/recipes"),
            "postgres://recipes@db/recipes"
        );
        assert_eq!(redact_dsn("not a url"), "invalid-dsn");
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }

    #[tokio::test]
    async fn local_strategy_reuses_codec() -> Result<()> {
        let codec = TokenCodec::new(SecretString::from("s3cret".to_string()));
        let strategy = bearer_strategy(Strategy::Local, &codec).await?;
        assert_eq!(strategy.name(), "local");

        let key = SecretString::from("key".to_string());
        let strategy = bearer_strategy(Strategy::ApiKey(key), &codec).await?;
        assert_eq!(strategy.name(), "api-key");
        Ok(())
    }
}
