use clap::{Arg, ArgMatches, Command};

pub const ARG_RATE_AUTH: &str = "rate-auth";
pub const ARG_RATE_ADMIN: &str = "rate-admin";
pub const ARG_RATE_GENERAL: &str = "rate-general";
pub const ARG_BUCKET_IDLE_SECONDS: &str = "bucket-idle-seconds";
pub const ARG_MAX_BUCKETS: &str = "max-buckets";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub auth_per_minute: u32,
    pub admin_per_minute: u32,
    pub general_per_minute: u32,
    pub bucket_idle_seconds: u64,
    pub max_buckets: usize,
    pub lockout_threshold: u32,
}

impl Options {
    /// Parse rate limit and lockout arguments from matches.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            auth_per_minute: matches
                .get_one::<u32>(ARG_RATE_AUTH)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_AUTH_PER_MINUTE),
            admin_per_minute: matches
                .get_one::<u32>(ARG_RATE_ADMIN)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_ADMIN_PER_MINUTE),
            general_per_minute: matches
                .get_one::<u32>(ARG_RATE_GENERAL)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_GENERAL_PER_MINUTE),
            bucket_idle_seconds: matches
                .get_one::<u64>(ARG_BUCKET_IDLE_SECONDS)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_BUCKET_IDLE_SECONDS),
            max_buckets: matches
                .get_one::<usize>(ARG_MAX_BUCKETS)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_MAX_BUCKETS),
            lockout_threshold: matches
                .get_one::<u32>(ARG_LOCKOUT_THRESHOLD)
                .copied()
                .unwrap_or(crate::gate::config::DEFAULT_LOCKOUT_THRESHOLD),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_AUTH)
                .long(ARG_RATE_AUTH)
                .help("Requests per minute allowed on authentication endpoints, per client")
                .env("PORDISTO_RATE_AUTH")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_ADMIN)
                .long(ARG_RATE_ADMIN)
                .help("Requests per minute allowed on admin endpoints, per client")
                .env("PORDISTO_RATE_ADMIN")
                .default_value("20")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_GENERAL)
                .long(ARG_RATE_GENERAL)
                .help("Requests per minute allowed on all other endpoints, per client")
                .env("PORDISTO_RATE_GENERAL")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_BUCKET_IDLE_SECONDS)
                .long(ARG_BUCKET_IDLE_SECONDS)
                .help("Seconds of inactivity before a rate limit bucket is dropped")
                .env("PORDISTO_BUCKET_IDLE_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_MAX_BUCKETS)
                .long(ARG_MAX_BUCKETS)
                .help("Upper bound on tracked rate limit buckets")
                .long_help(
                    "Upper bound on tracked rate limit buckets. When the table is full,\nrequests from clients without an existing bucket are rejected until idle\nbuckets are swept out.",
                )
                .env("PORDISTO_MAX_BUCKETS")
                .default_value("10000")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long(ARG_LOCKOUT_THRESHOLD)
                .help("Consecutive failed logins before an account is locked")
                .env("PORDISTO_LOCKOUT_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}
