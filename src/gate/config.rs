//! Pipeline configuration.

use secrecy::SecretString;

use super::policy::{AccessRule, Requirement, Role};
use super::request::EndpointClass;
use super::throttle::RateQuota;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const DEFAULT_ISSUER: &str = "pordisto";
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_AUTH_PER_MINUTE: u32 = 5;
pub const DEFAULT_ADMIN_PER_MINUTE: u32 = 20;
pub const DEFAULT_GENERAL_PER_MINUTE: u32 = 100;
pub const DEFAULT_BUCKET_IDLE_SECONDS: u64 = 60 * 60;
pub const DEFAULT_MAX_BUCKETS: usize = 10_000;
pub const DEFAULT_ROTATION_PATH: &str = "/auth/password";

#[derive(Clone, Debug)]
pub struct GateConfig {
    signing_secret: Option<SecretString>,
    pepper: Option<SecretString>,
    issuer: String,
    token_ttl_seconds: i64,
    lockout_threshold: u32,
    auth_quota: RateQuota,
    admin_quota: RateQuota,
    general_quota: RateQuota,
    bucket_idle_seconds: u64,
    max_buckets: usize,
    rotation_path: String,
    extra_public_paths: Vec<String>,
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing_secret: None,
            pepper: None,
            issuer: DEFAULT_ISSUER.to_string(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            auth_quota: RateQuota::per_minute(DEFAULT_AUTH_PER_MINUTE),
            admin_quota: RateQuota::per_minute(DEFAULT_ADMIN_PER_MINUTE),
            general_quota: RateQuota::per_minute(DEFAULT_GENERAL_PER_MINUTE),
            bucket_idle_seconds: DEFAULT_BUCKET_IDLE_SECONDS,
            max_buckets: DEFAULT_MAX_BUCKETS,
            rotation_path: DEFAULT_ROTATION_PATH.to_string(),
            extra_public_paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_signing_secret(mut self, secret: SecretString) -> Self {
        self.signing_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn with_pepper(mut self, pepper: SecretString) -> Self {
        self.pepper = Some(pepper);
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_auth_per_minute(mut self, per_minute: u32) -> Self {
        self.auth_quota = RateQuota::per_minute(per_minute);
        self
    }

    #[must_use]
    pub fn with_admin_per_minute(mut self, per_minute: u32) -> Self {
        self.admin_quota = RateQuota::per_minute(per_minute);
        self
    }

    #[must_use]
    pub fn with_general_per_minute(mut self, per_minute: u32) -> Self {
        self.general_quota = RateQuota::per_minute(per_minute);
        self
    }

    #[must_use]
    pub fn with_bucket_idle_seconds(mut self, seconds: u64) -> Self {
        self.bucket_idle_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    #[must_use]
    pub fn with_rotation_path(mut self, path: String) -> Self {
        self.rotation_path = path;
        self
    }

    /// Mark one more path as public, in addition to the built-in set.
    #[must_use]
    pub fn with_public_path(mut self, path: String) -> Self {
        self.extra_public_paths.push(path);
        self
    }

    #[must_use]
    pub fn signing_secret(&self) -> Option<&SecretString> {
        self.signing_secret.as_ref()
    }

    #[must_use]
    pub fn pepper(&self) -> Option<&SecretString> {
        self.pepper.as_ref()
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn lockout_threshold(&self) -> u32 {
        self.lockout_threshold
    }

    #[must_use]
    pub fn rotation_path(&self) -> &str {
        &self.rotation_path
    }

    pub(crate) fn auth_quota(&self) -> RateQuota {
        self.auth_quota
    }

    pub(crate) fn admin_quota(&self) -> RateQuota {
        self.admin_quota
    }

    pub(crate) fn general_quota(&self) -> RateQuota {
        self.general_quota
    }

    pub(crate) fn bucket_idle_seconds(&self) -> u64 {
        self.bucket_idle_seconds
    }

    pub(crate) fn max_buckets(&self) -> usize {
        self.max_buckets
    }

    /// Route rules with the deployment's extra public paths folded in. The
    /// rotation path stays reachable for accounts pending rotation.
    pub(crate) fn access_rules(&self) -> Vec<AccessRule> {
        let mut rules = vec![
            AccessRule::new("/", Requirement::Public),
            AccessRule::new("/health", Requirement::Public),
            AccessRule::new("/openapi.json", Requirement::Public),
            AccessRule::new("/auth/login", Requirement::Public),
            AccessRule::new(self.rotation_path.clone(), Requirement::Authenticated),
            AccessRule::new("/admin/*", Requirement::Role(Role::Admin)),
            AccessRule::new("/*", Requirement::Authenticated),
        ];
        for path in &self.extra_public_paths {
            rules.push(AccessRule::new(path.clone(), Requirement::Public));
        }
        rules
    }

    pub(crate) fn class_rules(&self) -> Vec<(String, EndpointClass)> {
        vec![
            ("/auth/*".to_string(), EndpointClass::Auth),
            ("/admin/*".to_string(), EndpointClass::Admin),
        ]
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}
