//! Path normalization and the ordered route-rule table.
//!
//! Rules use an exact path or a trailing `/*` prefix wildcard. The table is
//! sorted once at construction, most specific first (exact before wildcard,
//! longer before shorter), and lookups take the first match. Paths that match
//! no rule require authentication.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::request::EndpointClass;

/// Roles understood by route rules and identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What a matched route demands from the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(Role),
}

/// One entry of the rule table.
#[derive(Clone, Debug)]
pub struct AccessRule {
    pub pattern: String,
    pub requirement: Requirement,
}

impl AccessRule {
    #[must_use]
    pub fn new(pattern: impl Into<String>, requirement: Requirement) -> Self {
        Self {
            pattern: pattern.into(),
            requirement,
        }
    }
}

/// Ordered route policy shared by the whole pipeline.
#[derive(Clone, Debug)]
pub struct RoutePolicy {
    rules: Vec<AccessRule>,
    class_rules: Vec<(String, EndpointClass)>,
    rotation_path: String,
}

impl RoutePolicy {
    #[must_use]
    pub fn new(
        mut rules: Vec<AccessRule>,
        class_rules: Vec<(String, EndpointClass)>,
        rotation_path: String,
    ) -> Self {
        // Stable sort keeps insertion order for rules of equal specificity.
        rules.sort_by_key(|rule| {
            (
                rule.pattern.ends_with("/*"),
                Reverse(rule.pattern.len()),
            )
        });
        Self {
            rules,
            class_rules,
            rotation_path,
        }
    }

    /// Requirement of the first matching rule; unmatched paths require
    /// authentication.
    #[must_use]
    pub fn requirement(&self, normalized_path: &str) -> Requirement {
        self.rules
            .iter()
            .find(|rule| pattern_matches(&rule.pattern, normalized_path))
            .map_or(Requirement::Authenticated, |rule| rule.requirement)
    }

    /// Rate-limit class for a path; anything unclassified is `General`.
    #[must_use]
    pub fn endpoint_class(&self, normalized_path: &str) -> EndpointClass {
        self.class_rules
            .iter()
            .find(|(pattern, _)| pattern_matches(pattern, normalized_path))
            .map_or(EndpointClass::General, |(_, class)| *class)
    }

    /// Whether `normalized_path` is the credential-rotation endpoint, the one
    /// route a forced-rotation account may still reach.
    #[must_use]
    pub fn is_rotation_path(&self, normalized_path: &str) -> bool {
        normalized_path == self.rotation_path
    }
}

/// Collapse duplicate separators so `//admin///users` hits the same rules as
/// `/admin/users`. Anything beyond slash collapsing is left to the router.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        normalized.push(ch);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    normalized
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(base) = pattern.strip_suffix("/*") {
        // A prefix wildcard matches the base path itself and anything below it.
        return path == base
            || path
                .strip_prefix(base)
                .is_some_and(|rest| rest.starts_with('/'));
    }
    path == pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RoutePolicy {
        RoutePolicy::new(
            vec![
                AccessRule::new("/*", Requirement::Authenticated),
                AccessRule::new("/health", Requirement::Public),
                AccessRule::new("/auth/login", Requirement::Public),
                AccessRule::new("/auth/password", Requirement::Authenticated),
                AccessRule::new("/admin/*", Requirement::Role(Role::Admin)),
                AccessRule::new("/", Requirement::Public),
            ],
            vec![
                ("/auth/*".to_string(), EndpointClass::Auth),
                ("/admin/*".to_string(), EndpointClass::Admin),
            ],
            "/auth/password".to_string(),
        )
    }

    #[test]
    fn normalize_collapses_duplicate_slashes() {
        assert_eq!(normalize_path("//admin///users"), "/admin/users");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn normalize_handles_empty_and_relative() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("health"), "/health");
    }

    #[test]
    fn normalize_keeps_trailing_slash() {
        assert_eq!(normalize_path("/admin/"), "/admin/");
    }

    #[test]
    fn exact_rules_win_over_wildcards() {
        let policy = policy();
        assert_eq!(policy.requirement("/health"), Requirement::Public);
        assert_eq!(policy.requirement("/auth/login"), Requirement::Public);
        assert_eq!(
            policy.requirement("/auth/password"),
            Requirement::Authenticated
        );
    }

    #[test]
    fn wildcard_matches_base_and_children() {
        let policy = policy();
        assert_eq!(
            policy.requirement("/admin"),
            Requirement::Role(Role::Admin)
        );
        assert_eq!(
            policy.requirement("/admin/users/alice"),
            Requirement::Role(Role::Admin)
        );
        // Prefix match is segment-aware.
        assert_eq!(
            policy.requirement("/administrator"),
            Requirement::Authenticated
        );
    }

    #[test]
    fn catch_all_applies_last() {
        let policy = policy();
        assert_eq!(
            policy.requirement("/anything/else"),
            Requirement::Authenticated
        );
        assert_eq!(policy.requirement("/"), Requirement::Public);
    }

    #[test]
    fn unmatched_paths_require_authentication() {
        let policy = RoutePolicy::new(vec![], vec![], "/auth/password".to_string());
        assert_eq!(
            policy.requirement("/whatever"),
            Requirement::Authenticated
        );
    }

    #[test]
    fn endpoint_classes() {
        let policy = policy();
        assert_eq!(policy.endpoint_class("/auth/login"), EndpointClass::Auth);
        assert_eq!(policy.endpoint_class("/admin/users"), EndpointClass::Admin);
        assert_eq!(policy.endpoint_class("/health"), EndpointClass::General);
    }

    #[test]
    fn rotation_path_is_exact() {
        let policy = policy();
        assert!(policy.is_rotation_path("/auth/password"));
        assert!(!policy.is_rotation_path("/auth/password/extra"));
    }

    #[test]
    fn role_parses_case_insensitive() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" user ".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }
}
