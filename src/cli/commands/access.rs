use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_PUBLIC_PATH: &str = "public-path";
pub const ARG_ROTATION_PATH: &str = "rotation-path";
pub const ARG_SEED_ADMIN: &str = "seed-admin";
pub const ARG_SEED_ADMIN_PASSWORD: &str = "seed-admin-password";

#[derive(Debug, Clone)]
pub struct Options {
    pub public_paths: Vec<String>,
    pub rotation_path: String,
    pub seed_admin: String,
    pub seed_admin_password: Option<String>,
}

impl Options {
    /// Parse access rule and bootstrap arguments from matches.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            public_paths: matches
                .get_many::<String>(ARG_PUBLIC_PATH)
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            rotation_path: matches
                .get_one::<String>(ARG_ROTATION_PATH)
                .cloned()
                .unwrap_or_else(|| crate::gate::config::DEFAULT_ROTATION_PATH.to_string()),
            seed_admin: matches
                .get_one::<String>(ARG_SEED_ADMIN)
                .cloned()
                .unwrap_or_else(|| "admin".to_string()),
            seed_admin_password: matches
                .get_one::<String>(ARG_SEED_ADMIN_PASSWORD)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PUBLIC_PATH)
                .long(ARG_PUBLIC_PATH)
                .help("Additional path to serve without a token (repeatable, comma separated)")
                .env("PORDISTO_PUBLIC_PATHS")
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
        .arg(
            Arg::new(ARG_ROTATION_PATH)
                .long(ARG_ROTATION_PATH)
                .help("Path that stays reachable while a credential rotation is pending")
                .env("PORDISTO_ROTATION_PATH")
                .default_value("/auth/password"),
        )
        .arg(
            Arg::new(ARG_SEED_ADMIN)
                .long(ARG_SEED_ADMIN)
                .help("Username of the administrator account seeded at startup")
                .env("PORDISTO_SEED_ADMIN")
                .default_value("admin"),
        )
        .arg(
            Arg::new(ARG_SEED_ADMIN_PASSWORD)
                .long(ARG_SEED_ADMIN_PASSWORD)
                .help("Bootstrap password for the seeded administrator")
                .long_help(
                    "Bootstrap password for the seeded administrator. When unset, a one-time\npassword is generated and printed to the log; either way the account must\nrotate its credential on first login.",
                )
                .env("PORDISTO_SEED_ADMIN_PASSWORD"),
        )
}
