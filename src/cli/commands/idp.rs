use clap::{builder::PossibleValuesParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TOKEN_STRATEGY: &str = "token-strategy";
pub const ARG_IDP_ISSUER: &str = "idp-issuer";
pub const ARG_IDP_AUDIENCE: &str = "idp-audience";
pub const ARG_IDP_CLOCK_SKEW_SECONDS: &str = "idp-clock-skew-seconds";
pub const ARG_IDP_JWKS_CACHE_SECONDS: &str = "idp-jwks-cache-seconds";
pub const ARG_IDP_REQUIRED_SCOPE: &str = "idp-required-scope";
pub const ARG_API_KEY: &str = "api-key";

/// Upper bound for `--idp-jwks-cache-seconds` (one day).
const MAX_JWKS_CACHE_SECONDS: u64 = 86_400;

pub const STRATEGY_LOCAL: &str = "local";
pub const STRATEGY_FEDERATED: &str = "federated";
pub const STRATEGY_API_KEY: &str = "api-key";

/// Bearer credential accepted by protected routes.
#[derive(Debug, Clone)]
pub enum Strategy {
    Local,
    Federated {
        issuer: String,
        audience: String,
        clock_skew_seconds: i64,
        jwks_cache_seconds: u64,
        required_scope: Option<String>,
    },
    ApiKey(SecretString),
}

impl Strategy {
    /// Parse the bearer strategy and the settings it needs.
    ///
    /// # Errors
    /// Returns an error if the chosen strategy is missing its settings.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let strategy = matches
            .get_one::<String>(ARG_TOKEN_STRATEGY)
            .map_or(STRATEGY_LOCAL, String::as_str);

        match strategy {
            STRATEGY_FEDERATED => {
                let Some(issuer) = get_non_empty(ARG_IDP_ISSUER) else {
                    anyhow::bail!("missing required argument: --{ARG_IDP_ISSUER}");
                };
                let Some(audience) = get_non_empty(ARG_IDP_AUDIENCE) else {
                    anyhow::bail!("missing required argument: --{ARG_IDP_AUDIENCE}");
                };
                let clock_skew_seconds = matches
                    .get_one::<i64>(ARG_IDP_CLOCK_SKEW_SECONDS)
                    .copied()
                    .unwrap_or_default();
                if clock_skew_seconds < 0 {
                    anyhow::bail!("--{ARG_IDP_CLOCK_SKEW_SECONDS} must not be negative");
                }
                Ok(Self::Federated {
                    issuer,
                    audience,
                    clock_skew_seconds,
                    jwks_cache_seconds: matches
                        .get_one::<u64>(ARG_IDP_JWKS_CACHE_SECONDS)
                        .copied()
                        .unwrap_or_default(),
                    required_scope: get_non_empty(ARG_IDP_REQUIRED_SCOPE),
                })
            }
            STRATEGY_API_KEY => match get_non_empty(ARG_API_KEY) {
                Some(key) => Ok(Self::ApiKey(SecretString::from(key))),
                None => anyhow::bail!("missing required argument: --{ARG_API_KEY}"),
            },
            _ => Ok(Self::Local),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_STRATEGY)
                .long(ARG_TOKEN_STRATEGY)
                .help("Bearer credential accepted by protected routes")
                .env("RECIPES_TOKEN_STRATEGY")
                .default_value(STRATEGY_LOCAL)
                .value_parser(PossibleValuesParser::new([
                    STRATEGY_LOCAL,
                    STRATEGY_FEDERATED,
                    STRATEGY_API_KEY,
                ])),
        )
        .arg(
            Arg::new(ARG_IDP_ISSUER)
                .long(ARG_IDP_ISSUER)
                .help("Identity provider issuer URL (federated strategy)")
                .long_help(
                    "Identity provider issuer URL. The JWKS location is read from\n`{issuer}/.well-known/openid-configuration` and the keys are cached.",
                )
                .env("RECIPES_IDP_ISSUER"),
        )
        .arg(
            Arg::new(ARG_IDP_AUDIENCE)
                .long(ARG_IDP_AUDIENCE)
                .help("Expected audience (aud) of identity provider tokens")
                .env("RECIPES_IDP_AUDIENCE"),
        )
        .arg(
            Arg::new(ARG_IDP_CLOCK_SKEW_SECONDS)
                .long(ARG_IDP_CLOCK_SKEW_SECONDS)
                .help("Allowed clock skew when checking exp/nbf")
                .env("RECIPES_IDP_CLOCK_SKEW_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_IDP_JWKS_CACHE_SECONDS)
                .long(ARG_IDP_JWKS_CACHE_SECONDS)
                .help("How long the fetched JWKS is trusted before refetching")
                .env("RECIPES_IDP_JWKS_CACHE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(..=MAX_JWKS_CACHE_SECONDS)),
        )
        .arg(
            Arg::new(ARG_IDP_REQUIRED_SCOPE)
                .long(ARG_IDP_REQUIRED_SCOPE)
                .help("Scope every identity provider token must carry")
                .env("RECIPES_IDP_REQUIRED_SCOPE"),
        )
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Static key expected in X-API-Key (api-key strategy)")
                .env("RECIPES_API_KEY")
                .hide_env_values(true),
        )
}
