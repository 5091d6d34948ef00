pub mod access;
pub mod limits;
pub mod logging;
pub mod token;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

/// Validate path arguments that clap cannot check on its own.
///
/// # Errors
/// Returns an error string if a path argument is not absolute.
pub fn validate(matches: &clap::ArgMatches) -> Result<(), String> {
    if let Some(path) = matches.get_one::<String>(access::ARG_ROTATION_PATH) {
        if !path.starts_with('/') {
            return Err(format!(
                "Invalid --rotation-path '{path}': paths must start with '/'"
            ));
        }
    }

    if let Some(paths) = matches.get_many::<String>(access::ARG_PUBLIC_PATH) {
        for path in paths {
            if !path.starts_with('/') {
                return Err(format!(
                    "Invalid --public-path '{path}': paths must start with '/'"
                ));
            }
        }
    }

    Ok(())
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("pordisto")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PORDISTO_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = token::with_args(command);
    let command = limits::with_args(command);
    let command = access::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "pordisto");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_args() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "pordisto",
            "--port",
            "9000",
            "--token-secret",
            "0123456789abcdef0123456789abcdef",
            "--rate-auth",
            "10",
            "--lockout-threshold",
            "3",
            "--public-path",
            "/metrics",
            "--public-path",
            "/status",
        ]);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(9000));
        assert_eq!(
            matches.get_one::<String>("token-secret").cloned(),
            Some("0123456789abcdef0123456789abcdef".to_string())
        );
        assert_eq!(matches.get_one::<u32>("rate-auth").copied(), Some(10));
        assert_eq!(
            matches.get_one::<u32>("lockout-threshold").copied(),
            Some(3)
        );
        assert_eq!(
            matches
                .get_many::<String>("public-path")
                .map(|paths| paths.cloned().collect::<Vec<_>>()),
            Some(vec!["/metrics".to_string(), "/status".to_string()])
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("PORDISTO_PORT", None::<&str>),
                ("PORDISTO_TOKEN_TTL_SECONDS", None),
                ("PORDISTO_TOKEN_ISSUER", None),
                ("PORDISTO_RATE_AUTH", None),
                ("PORDISTO_RATE_ADMIN", None),
                ("PORDISTO_RATE_GENERAL", None),
                ("PORDISTO_ROTATION_PATH", None),
                ("PORDISTO_SEED_ADMIN", None),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["pordisto"]);

                assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<i64>("token-ttl-seconds").copied(),
                    Some(86_400)
                );
                assert_eq!(
                    matches.get_one::<String>("token-issuer").cloned(),
                    Some("pordisto".to_string())
                );
                assert_eq!(matches.get_one::<u32>("rate-auth").copied(), Some(5));
                assert_eq!(matches.get_one::<u32>("rate-admin").copied(), Some(20));
                assert_eq!(matches.get_one::<u32>("rate-general").copied(), Some(100));
                assert_eq!(
                    matches.get_one::<String>("rotation-path").cloned(),
                    Some("/auth/password".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("seed-admin").cloned(),
                    Some("admin".to_string())
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PORDISTO_PORT", Some("443")),
                (
                    "PORDISTO_TOKEN_SECRET",
                    Some("0123456789abcdef0123456789abcdef"),
                ),
                ("PORDISTO_RATE_AUTH", Some("7")),
                ("PORDISTO_PUBLIC_PATHS", Some("/metrics,/status")),
                ("PORDISTO_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["pordisto"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("token-secret").cloned(),
                    Some("0123456789abcdef0123456789abcdef".to_string())
                );
                assert_eq!(matches.get_one::<u32>("rate-auth").copied(), Some(7));
                assert_eq!(
                    matches
                        .get_many::<String>("public-path")
                        .map(|paths| paths.cloned().collect::<Vec<_>>()),
                    Some(vec!["/metrics".to_string(), "/status".to_string()])
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("PORDISTO_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["pordisto"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("PORDISTO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["pordisto".to_string()];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_validate_rejects_relative_rotation_path() {
        let command = new();
        let matches =
            command.get_matches_from(vec!["pordisto", "--rotation-path", "auth/password"]);
        let result = validate(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.contains("--rotation-path"));
        }
    }

    #[test]
    fn test_validate_rejects_relative_public_path() {
        let command = new();
        let matches = command.get_matches_from(vec!["pordisto", "--public-path", "metrics"]);
        let result = validate(&matches);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.contains("--public-path"));
        }
    }

    #[test]
    fn test_validate_accepts_absolute_paths() {
        temp_env::with_vars([("PORDISTO_PUBLIC_PATHS", None::<&str>)], || {
            let command = new();
            let matches = command.get_matches_from(vec![
                "pordisto",
                "--rotation-path",
                "/auth/password",
                "--public-path",
                "/metrics",
            ]);
            assert_eq!(validate(&matches), Ok(()));
        });
    }
}
