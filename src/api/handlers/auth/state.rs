//! Auth policy knobs shared by sign-in, refresh and the session cookie.

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_REFRESH_EXTENSION_SECONDS: i64 = 5 * 60;
const DEFAULT_REFRESH_GRACE_SECONDS: i64 = 30;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_seconds: i64,
    refresh_extension_seconds: i64,
    refresh_grace_seconds: i64,
    sessions_enabled: bool,
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_extension_seconds: DEFAULT_REFRESH_EXTENSION_SECONDS,
            refresh_grace_seconds: DEFAULT_REFRESH_GRACE_SECONDS,
            sessions_enabled: true,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_extension_seconds(mut self, seconds: i64) -> Self {
        self.refresh_extension_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_grace_seconds(mut self, seconds: i64) -> Self {
        self.refresh_grace_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, enabled: bool) -> Self {
        self.sessions_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_extension_seconds(&self) -> i64 {
        self.refresh_extension_seconds
    }

    /// A token with at most this many seconds left may be refreshed.
    #[must_use]
    pub fn refresh_grace_seconds(&self) -> i64 {
        self.refresh_grace_seconds
    }

    #[must_use]
    pub fn sessions_enabled(&self) -> bool {
        self.sessions_enabled
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

#[cfg(test)]
mod tests {
    use super::AuthConfig;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();

        assert_eq!(
            config.access_token_ttl_seconds(),
            super::DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.access_token_ttl_seconds(), 600);
        assert_eq!(config.refresh_extension_seconds(), 300);
        assert_eq!(config.refresh_grace_seconds(), 30);
        assert!(config.sessions_enabled());
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert!(!config.session_cookie_secure());

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_extension_seconds(120)
            .with_refresh_grace_seconds(5)
            .with_sessions(false)
            .with_session_ttl_seconds(3600)
            .with_session_cookie_secure(true);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_extension_seconds(), 120);
        assert_eq!(config.refresh_grace_seconds(), 5);
        assert!(!config.sessions_enabled());
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert!(config.session_cookie_secure());
    }
}
