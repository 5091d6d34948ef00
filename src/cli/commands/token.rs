use clap::{Arg, ArgMatches, Command};

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_PEPPER: &str = "pepper";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: Option<String>,
    pub ttl_seconds: i64,
    pub issuer: String,
    pub pepper: Option<String>,
}

impl Options {
    /// Parse token and credential arguments from matches.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        // Filter empty strings which clap passes through when env vars are set to ""
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            secret: get_non_empty(ARG_TOKEN_SECRET),
            ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_TOKEN_TTL_SECONDS),
            issuer: matches
                .get_one::<String>(ARG_TOKEN_ISSUER)
                .cloned()
                .unwrap_or_else(|| crate::gate::config::DEFAULT_ISSUER.to_string()),
            pepper: get_non_empty(ARG_PEPPER),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HS256 signing secret for bearer tokens (32 bytes minimum)")
                .long_help(
                    "HS256 signing secret for bearer tokens. Secrets shorter than 32 bytes are\nrejected and a development fallback is used instead; never rely on the\nfallback outside local testing.",
                )
                .env("PORDISTO_TOKEN_SECRET"),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Bearer token TTL in seconds")
                .env("PORDISTO_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer claim stamped into and required from bearer tokens")
                .env("PORDISTO_TOKEN_ISSUER")
                .default_value("pordisto"),
        )
        .arg(
            Arg::new(ARG_PEPPER)
                .long(ARG_PEPPER)
                .help("Application pepper mixed into the bootstrap credential hash")
                .env("PORDISTO_PEPPER"),
        )
}
