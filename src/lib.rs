//! # Recipes API
//!
//! `recipes` serves a collection of cooking recipes behind an authentication
//! layer.
//!
//! ## Authentication
//!
//! - **Sign-in** checks a username against a bcrypt hash and mints a short-lived
//!   HS256 access token. When sessions are enabled it also creates a server-side
//!   session bound to the `recipes_api` cookie.
//! - **Refresh** reissues an access token only when the presented one is
//!   authentic and expired or about to expire. The password is not checked
//!   again.
//! - **Sign-out** deletes the server-side session. Access tokens stay valid
//!   until they expire.
//!
//! ## Access Gate
//!
//! Protected routes accept exactly one bearer strategy, chosen at startup:
//! locally issued tokens, tokens issued by an external identity provider
//! (verified against its JWKS), or a static API key. Requests without that
//! credential fall back to the session cookie.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
