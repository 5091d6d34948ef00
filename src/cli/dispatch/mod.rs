//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{access, limits, token};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    // Path arguments must be absolute
    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let token_opts = token::Options::parse(matches);
    let limit_opts = limits::Options::parse(matches);
    let access_opts = access::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        token_secret: token_opts.secret,
        token_ttl_seconds: token_opts.ttl_seconds,
        token_issuer: token_opts.issuer,
        pepper: token_opts.pepper,
        auth_per_minute: limit_opts.auth_per_minute,
        admin_per_minute: limit_opts.admin_per_minute,
        general_per_minute: limit_opts.general_per_minute,
        bucket_idle_seconds: limit_opts.bucket_idle_seconds,
        max_buckets: limit_opts.max_buckets,
        lockout_threshold: limit_opts.lockout_threshold,
        public_paths: access_opts.public_paths,
        rotation_path: access_opts.rotation_path,
        seed_admin: access_opts.seed_admin,
        seed_admin_password: access_opts.seed_admin_password,
    }))
}
