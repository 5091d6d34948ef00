//! Route handlers and shared validation helpers.
//!
//! Handlers trust the governance middleware: by the time one runs, the
//! request already passed throttling, token validation, and role checks.
//! They only parse payloads, call the pipeline, and shape responses.

pub mod admin;
pub mod health;
pub mod login;
pub mod password;
pub mod root;
pub mod whoami;

use regex::Regex;
use std::sync::OnceLock;

/// Subject sanity check used before creating directory entries: lowercase
/// alphanumeric start, 3 to 32 chars total, dots, dashes and underscores
/// allowed after the first.
pub fn valid_subject(subject: &str) -> bool {
    // Compiled once; a pattern that fails to compile matches nothing.
    static SUBJECT_RE: OnceLock<Option<Regex>> = OnceLock::new();
    SUBJECT_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(subject))
}

#[cfg(test)]
mod tests {
    use super::valid_subject;

    #[test]
    fn valid_subject_accepts_simple() {
        assert!(valid_subject("alice"));
        assert!(valid_subject("svc-backup.7"));
    }

    #[test]
    fn valid_subject_rejects_short() {
        assert!(!valid_subject("ab"));
    }

    #[test]
    fn valid_subject_rejects_uppercase() {
        assert!(!valid_subject("Alice"));
    }

    #[test]
    fn valid_subject_rejects_leading_punctuation() {
        assert!(!valid_subject("-alice"));
    }

    #[test]
    fn valid_subject_rejects_long() {
        assert!(!valid_subject(&"a".repeat(33)));
    }
}
