//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{provision, server, Action};
use crate::cli::commands::{
    auth, idp, ARG_DSN, ARG_PASSWORD, ARG_PORT, ARG_USERNAME, CMD_PROVISION,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

fn dsn(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .context("missing required argument: --dsn")
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(CMD_PROVISION) {
        return Ok(Action::Provision(provision::Args {
            dsn: dsn(sub)?,
            username: sub
                .get_one::<String>(ARG_USERNAME)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .context("missing required argument: --username")?,
            password: sub
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .filter(|v| !v.is_empty())
                .map(SecretString::from)
                .context("missing required argument: --password")?,
            bcrypt_cost: auth::bcrypt_cost(sub),
        }));
    }

    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = dsn(matches)?;
    let auth_opts = auth::Options::parse(matches)?;
    let strategy = idp::Strategy::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        session_dsn: auth_opts.session_dsn.clone().unwrap_or_else(|| dsn.clone()),
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_extension_seconds: auth_opts.refresh_extension_seconds,
        refresh_grace_seconds: auth_opts.refresh_grace_seconds,
        sessions: auth_opts.sessions,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_cookie_secure: auth_opts.session_cookie_secure,
        bcrypt_cost: auth_opts.bcrypt_cost,
        strategy,
    }))
}
