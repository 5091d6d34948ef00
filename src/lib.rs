//! # Pordisto (Request Governance for Home Servers)
//!
//! `pordisto` fronts a small home-server API and decides, request by request,
//! whether the caller may proceed. Every request runs the same pipeline:
//!
//! 1. Path normalization and route-rule lookup (first match wins, most
//!    specific rule first).
//! 2. Token-bucket rate limiting per client address and endpoint class.
//! 3. Bearer token validation (`HS256`, absolute expiry, fail closed).
//! 4. Account state checks: disabled, locked, pending credential rotation.
//! 5. Role requirements for administrative routes.
//!
//! Outcomes are audited. Security events carry a severity tag and every
//! request leaves an access record with status and latency, no matter how the
//! pipeline exited.
//!
//! ## Credentials
//!
//! Stored credentials carry a per-record algorithm tag. Interactive logins use
//! bcrypt over a Base64-encoded SHA-512 prehash; the bootstrap credential uses
//! PBKDF2-HMAC-SHA-512 with an application pepper and a per-record salt.
//! Raw passwords and tokens never appear in logs or audit records.

pub mod api;
pub mod cli;
pub mod gate;

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
