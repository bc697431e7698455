use clap::{Arg, ArgAction, ArgMatches, Command};
use crate::api::handlers::auth::DEFAULT_BCRYPT_COST;
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_EXTENSION_SECONDS: &str = "refresh-extension-seconds";
pub const ARG_REFRESH_GRACE_SECONDS: &str = "refresh-grace-seconds";
pub const ARG_SESSIONS: &str = "sessions";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_SESSION_DSN: &str = "session-dsn";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_extension_seconds: i64,
    pub refresh_grace_seconds: i64,
    pub sessions: bool,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub session_dsn: Option<String>,
    pub bcrypt_cost: u32,
}

impl Options {
    /// Parse token and session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or a duration is not positive.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        let positive = |id: &str| -> anyhow::Result<i64> {
            let value = matches.get_one::<i64>(id).copied().unwrap_or_default();
            if value <= 0 {
                anyhow::bail!("--{id} must be greater than zero");
            }
            Ok(value)
        };

        let refresh_grace_seconds = matches
            .get_one::<i64>(ARG_REFRESH_GRACE_SECONDS)
            .copied()
            .unwrap_or_default();
        if refresh_grace_seconds < 0 {
            anyhow::bail!("--{ARG_REFRESH_GRACE_SECONDS} must not be negative");
        }

        Ok(Self {
            jwt_secret,
            access_token_ttl_seconds: positive(ARG_ACCESS_TOKEN_TTL_SECONDS)?,
            refresh_extension_seconds: positive(ARG_REFRESH_EXTENSION_SECONDS)?,
            refresh_grace_seconds,
            sessions: matches.get_one::<bool>(ARG_SESSIONS).copied().unwrap_or(true),
            session_ttl_seconds: positive(ARG_SESSION_TTL_SECONDS)?,
            session_cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            session_dsn: matches
                .get_one::<String>(ARG_SESSION_DSN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            bcrypt_cost: bcrypt_cost(matches),
        })
    }
}

/// Cost used for the dummy hash at startup and by `provision`.
#[must_use]
pub fn bcrypt_cost(matches: &ArgMatches) -> u32 {
    matches
        .get_one::<u32>(ARG_BCRYPT_COST)
        .copied()
        .unwrap_or(DEFAULT_BCRYPT_COST)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_session_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign and verify access tokens")
                .env("RECIPES_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("RECIPES_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_EXTENSION_SECONDS)
                .long(ARG_REFRESH_EXTENSION_SECONDS)
                .help("Lifetime in seconds of a refreshed token, counted from the refresh")
                .env("RECIPES_REFRESH_EXTENSION_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_GRACE_SECONDS)
                .long(ARG_REFRESH_GRACE_SECONDS)
                .help("Refresh is allowed this many seconds before expiry")
                .env("RECIPES_REFRESH_GRACE_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt cost for new password hashes")
                .env("RECIPES_BCRYPT_COST")
                .global(true)
                .default_value("12")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSIONS)
                .long(ARG_SESSIONS)
                .help("Create a server-side session at sign-in")
                .env("RECIPES_SESSIONS")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session and cookie lifetime in seconds")
                .env("RECIPES_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure")
                .env("RECIPES_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_DSN)
                .long(ARG_SESSION_DSN)
                .help("Session database connection string (defaults to --dsn)")
                .env("RECIPES_SESSION_DSN"),
        )
}
