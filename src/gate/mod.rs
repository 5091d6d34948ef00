//! Request governance pipeline.
//!
//! One request, one pass:
//!
//! 1. Normalize the path and classify the endpoint.
//! 2. Spend one rate-limit token for the client and class.
//! 3. Enforce the matched route rule: public, authenticated, or role-bound.
//! 4. Validate the bearer token fail closed, then check account state
//!    (disabled, locked, pending rotation) before attaching an identity.
//!
//! Security events are emitted where the pipeline decides; the access record
//! is written by the completion stage regardless of how the request ended.

pub mod audit;
pub mod config;
pub mod directory;
pub mod lockout;
pub mod password;
pub mod policy;
pub mod request;
pub mod throttle;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, error};

use self::audit::{AuditContext, AuditSink, AuditStore, SecurityEvent};
use self::config::GateConfig;
use self::directory::{normalize_subject, IdentityDirectory};
use self::lockout::{AccountGuard, FailureOutcome};
use self::password::PasswordHasher;
use self::policy::{normalize_path, Requirement, RoutePolicy};
use self::request::{AuthenticatedIdentity, Decision, Rejection, RequestDescriptor};
use self::throttle::{RateLimiter, ThrottleDecision};
use self::token::TokenService;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// Successful login outcome.
#[derive(Clone, Debug)]
pub struct LoginGrant {
    pub token: String,
    pub expires_in: i64,
    pub must_change_password: bool,
}

/// The governance pipeline. One instance serves the whole process; all
/// methods take `&self` and are safe to call concurrently.
pub struct Pipeline {
    policy: RoutePolicy,
    passwords: PasswordHasher,
    tokens: TokenService,
    guard: AccountGuard,
    throttle: RateLimiter,
    audit: AuditSink,
    directory: Arc<dyn IdentityDirectory>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: &GateConfig,
        directory: Arc<dyn IdentityDirectory>,
        store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            policy: RoutePolicy::new(
                config.access_rules(),
                config.class_rules(),
                config.rotation_path().to_string(),
            ),
            passwords: PasswordHasher::new(config.pepper()),
            tokens: TokenService::new(
                config.signing_secret(),
                config.issuer().to_string(),
                config.token_ttl_seconds(),
            ),
            guard: AccountGuard::new(config.lockout_threshold()),
            throttle: RateLimiter::new(
                config.auth_quota(),
                config.admin_quota(),
                config.general_quota(),
                Duration::from_secs(config.bucket_idle_seconds()),
                config.max_buckets(),
            ),
            audit: AuditSink::new(store),
            directory,
        }
    }

    #[must_use]
    pub fn audit(&self) -> &AuditSink {
        &self.audit
    }

    #[must_use]
    pub fn directory(&self) -> &dyn IdentityDirectory {
        self.directory.as_ref()
    }

    #[must_use]
    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn guard(&self) -> &AccountGuard {
        &self.guard
    }

    /// Decide whether `request` may proceed.
    #[must_use]
    pub fn admit(&self, request: &RequestDescriptor) -> Decision {
        self.admit_at(request, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub(crate) fn admit_at(&self, request: &RequestDescriptor, now_unix_seconds: i64) -> Decision {
        let ctx = request.audit_context();
        let path = normalize_path(&request.path);
        let class = self.policy.endpoint_class(&path);

        if let ThrottleDecision::Limited {
            retry_after_seconds,
            limit_per_minute,
        } = self.throttle.check(&request.client_addr, class)
        {
            self.audit.security_event(
                SecurityEvent::RateLimitExceeded,
                None,
                &ctx,
                json!({ "endpoint_class": class.as_str(), "limit_per_minute": limit_per_minute }),
            );
            return Decision::Rejected(Rejection::RateLimited {
                retry_after_seconds,
                limit_per_minute,
            });
        }

        let requirement = self.policy.requirement(&path);
        if requirement == Requirement::Public {
            // Public routes ignore broken tokens; a valid one still attaches
            // its identity so handlers can personalize.
            let identity = request.bearer.as_deref().and_then(|bearer| {
                self.checked_identity(bearer, &path, now_unix_seconds, None)
                    .ok()
            });
            return Decision::Allowed(identity);
        }

        let Some(bearer) = request.bearer.as_deref() else {
            return Decision::Rejected(Rejection::MissingToken);
        };

        let identity = match self.checked_identity(bearer, &path, now_unix_seconds, Some(&ctx)) {
            Ok(identity) => identity,
            Err(rejection) => return Decision::Rejected(rejection),
        };

        if let Requirement::Role(role) = requirement {
            if !identity.has_role(role) {
                self.audit.security_event(
                    SecurityEvent::UnauthorizedAccess,
                    Some(&identity.subject),
                    &ctx,
                    json!({ "resource": path, "missing_role": role.as_str() }),
                );
                return Decision::Rejected(Rejection::InsufficientRole);
            }
        }

        Decision::Allowed(Some(identity))
    }

    /// Token and account-state checks shared by protected and public routes.
    /// Account refusals audit only when a context is supplied; public routes
    /// pass `None` because their broken tokens are ignored, not refused.
    fn checked_identity(
        &self,
        bearer: &str,
        normalized_path: &str,
        now_unix_seconds: i64,
        audit_ctx: Option<&AuditContext>,
    ) -> Result<AuthenticatedIdentity, Rejection> {
        let claims = self
            .tokens
            .validate(bearer, now_unix_seconds)
            .map_err(|err| {
                debug!("token rejected: {err}");
                Rejection::InvalidToken
            })?;

        let Some(record) = self.directory.find(&claims.sub) else {
            // Unknown subjects refuse the same way disabled ones do.
            if let Some(ctx) = audit_ctx {
                self.audit.security_event(
                    SecurityEvent::UnauthorizedAccess,
                    Some(&claims.sub),
                    ctx,
                    json!({ "resource": normalized_path, "reason": "unknown subject" }),
                );
            }
            return Err(Rejection::AccountDisabled);
        };

        if !record.enabled {
            if let Some(ctx) = audit_ctx {
                self.audit.security_event(
                    SecurityEvent::UnauthorizedAccess,
                    Some(&record.subject),
                    ctx,
                    json!({ "resource": normalized_path, "reason": "account disabled" }),
                );
            }
            return Err(Rejection::AccountDisabled);
        }

        if record.locked || self.guard.is_locked(&record.subject) {
            if let Some(ctx) = audit_ctx {
                self.audit.security_event(
                    SecurityEvent::UnauthorizedAccess,
                    Some(&record.subject),
                    ctx,
                    json!({ "resource": normalized_path, "reason": "account locked" }),
                );
            }
            return Err(Rejection::AccountLocked);
        }

        if record.must_rotate && !self.policy.is_rotation_path(normalized_path) {
            // Routine redirect-to-rotation, not worth a security event.
            return Err(Rejection::RotationRequired);
        }

        Ok(AuthenticatedIdentity {
            subject: record.subject.clone(),
            user_id: record.user_id,
            roles: record.roles.clone(),
            must_rotate: record.must_rotate,
        })
    }

    /// Verify credentials and issue a token. Lockout bookkeeping and audit
    /// happen here; the caller only maps the rejection to a response.
    pub fn authenticate(
        &self,
        subject: &str,
        password: &str,
        ctx: &AuditContext,
    ) -> Result<LoginGrant, Rejection> {
        self.authenticate_at(subject, password, ctx, OffsetDateTime::now_utc())
    }

    pub(crate) fn authenticate_at(
        &self,
        subject: &str,
        password: &str,
        ctx: &AuditContext,
        now: OffsetDateTime,
    ) -> Result<LoginGrant, Rejection> {
        let subject = normalize_subject(subject);
        if subject.is_empty() || password.is_empty() {
            return Err(Rejection::Malformed);
        }

        let Some(record) = self.directory.find(&subject) else {
            // Unknown subjects burn the same response as bad passwords.
            self.audit.security_event(
                SecurityEvent::AuthenticationFailure,
                Some(&subject),
                ctx,
                json!({ "reason": "unknown subject" }),
            );
            return Err(Rejection::BadCredentials);
        };

        // Locked wins over everything, even a correct credential.
        if record.locked || self.guard.is_locked(&record.subject) {
            self.audit.security_event(
                SecurityEvent::AuthenticationFailure,
                Some(&record.subject),
                ctx,
                json!({ "reason": "account locked" }),
            );
            return Err(Rejection::AccountLocked);
        }

        if !record.enabled {
            self.audit.security_event(
                SecurityEvent::AuthenticationFailure,
                Some(&record.subject),
                ctx,
                json!({ "reason": "account disabled" }),
            );
            return Err(Rejection::AccountDisabled);
        }

        if !self.passwords.verify(password, &record.credential) {
            self.audit.security_event(
                SecurityEvent::AuthenticationFailure,
                Some(&record.subject),
                ctx,
                json!({ "reason": "invalid credentials" }),
            );
            if self.guard.record_failure(&record.subject) == FailureOutcome::JustLocked {
                if let Err(err) = self.directory.set_locked(&record.subject, true) {
                    error!("failed to persist lockout for {}: {err}", record.subject);
                }
                self.audit.security_event(
                    SecurityEvent::AccountLockout,
                    Some(&record.subject),
                    ctx,
                    json!({ "failed_attempts": self.guard.failed_attempts(&record.subject) }),
                );
            }
            return Err(Rejection::BadCredentials);
        }

        self.guard.record_success(&record.subject);
        if let Err(err) = self.directory.record_login(&record.subject, now) {
            error!("failed to record login for {}: {err}", record.subject);
        }

        let token = self
            .tokens
            .issue(&record.subject, now.unix_timestamp())
            .map_err(|err| {
                error!("failed to issue token for {}: {err}", record.subject);
                self.audit.security_event(
                    SecurityEvent::SuspiciousActivity,
                    Some(&record.subject),
                    ctx,
                    json!({ "reason": "token issuance failed" }),
                );
                Rejection::Internal
            })?;

        self.audit.security_event(
            SecurityEvent::AuthenticationSuccess,
            Some(&record.subject),
            ctx,
            json!({ "auth_method": "password" }),
        );

        Ok(LoginGrant {
            token,
            expires_in: self.tokens.ttl_seconds(),
            must_change_password: record.must_rotate,
        })
    }

    /// Rotate a credential. The current password must verify unless rotation
    /// is already forced; the new one replaces it under the interactive
    /// scheme and clears the rotation requirement.
    pub fn rotate_credential(
        &self,
        subject: &str,
        old_password: &str,
        new_password: &str,
        ctx: &AuditContext,
    ) -> Result<(), Rejection> {
        let subject = normalize_subject(subject);
        let Some(record) = self.directory.find(&subject) else {
            return Err(Rejection::AccountDisabled);
        };

        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(Rejection::Malformed);
        }

        if !record.must_rotate && !self.passwords.verify(old_password, &record.credential) {
            return Err(Rejection::CredentialMismatch);
        }

        let credential = self.passwords.hash(new_password).map_err(|err| {
            error!("failed to hash replacement credential: {err}");
            self.audit.security_event(
                SecurityEvent::SuspiciousActivity,
                Some(&record.subject),
                ctx,
                json!({ "reason": "credential hashing failed" }),
            );
            Rejection::Internal
        })?;

        self.directory
            .update_credential(&record.subject, credential)
            .map_err(|_| Rejection::AccountDisabled)?;

        self.audit.security_event(
            SecurityEvent::PasswordChange,
            Some(&record.subject),
            ctx,
            json!({ "forced": record.must_rotate }),
        );
        Ok(())
    }

    /// Completion stage: one access record per request, success or failure.
    pub fn record_access(
        &self,
        ctx: &AuditContext,
        actor: Option<&str>,
        status: u16,
        latency_ms: u128,
    ) {
        self.audit.access(ctx, actor, status, latency_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::audit::testing::RecordingStore;
    use super::directory::{IdentityRecord, MemoryDirectory};
    use super::policy::Role;
    use super::*;
    use secrecy::SecretString;

    const TEST_SECRET: &str = "test-secret-0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    fn fixture() -> (Pipeline, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        let config = GateConfig::new()
            .with_signing_secret(SecretString::from(TEST_SECRET))
            .with_pepper(SecretString::from("unit-test-pepper"));
        let pipeline = Pipeline::new(&config, Arc::new(MemoryDirectory::new()), store.clone());
        (pipeline, store)
    }

    fn seed(pipeline: &Pipeline, subject: &str, password: &str, roles: Vec<Role>) {
        let credential = pipeline.passwords().hash(password).unwrap();
        pipeline
            .directory()
            .create(IdentityRecord::new(subject, credential, roles))
            .unwrap();
    }

    fn seed_with(pipeline: &Pipeline, record: IdentityRecord) {
        pipeline.directory().create(record).unwrap();
    }

    fn descriptor(path: &str, bearer: Option<&str>) -> RequestDescriptor {
        RequestDescriptor {
            method: axum::http::Method::GET,
            path: path.to_string(),
            bearer: bearer.map(str::to_string),
            client_addr: "203.0.113.7".to_string(),
            user_agent: Some("tests".to_string()),
            request_id: None,
        }
    }

    fn ctx() -> AuditContext {
        AuditContext::default()
    }

    fn login(pipeline: &Pipeline, subject: &str, password: &str) -> Result<LoginGrant, Rejection> {
        pipeline.authenticate_at(
            subject,
            password,
            &ctx(),
            OffsetDateTime::from_unix_timestamp(NOW).unwrap(),
        )
    }

    #[test]
    fn login_issues_a_valid_token() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        let grant = login(&pipeline, "alice", "alice-password").unwrap();
        assert_eq!(grant.expires_in, 86_400);
        assert!(!grant.must_change_password);

        let claims = pipeline.tokens().validate(&grant.token, NOW).unwrap();
        assert_eq!(claims.sub, "alice");

        assert_eq!(store.count_of(SecurityEvent::AuthenticationSuccess), 1);
        assert_eq!(store.count_of(SecurityEvent::AuthenticationFailure), 0);
    }

    #[test]
    fn login_records_last_login() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        assert!(pipeline.directory().find("alice").unwrap().last_login.is_none());

        login(&pipeline, "alice", "alice-password").unwrap();
        let last_login = pipeline.directory().find("alice").unwrap().last_login;
        assert_eq!(last_login.map(OffsetDateTime::unix_timestamp), Some(NOW));
    }

    #[test]
    fn login_with_wrong_password_fails() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        assert_eq!(
            login(&pipeline, "alice", "not-the-password").unwrap_err(),
            Rejection::BadCredentials
        );
        assert_eq!(store.count_of(SecurityEvent::AuthenticationFailure), 1);
        assert_eq!(store.count_of(SecurityEvent::AuthenticationSuccess), 0);
    }

    #[test]
    fn login_unknown_subject_matches_wrong_password() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        // Same rejection for unknown subjects and bad passwords.
        assert_eq!(
            login(&pipeline, "ghost", "whatever-password").unwrap_err(),
            Rejection::BadCredentials
        );
        assert_eq!(store.count_of(SecurityEvent::AuthenticationFailure), 1);
    }

    #[test]
    fn login_empty_credentials_are_malformed() {
        let (pipeline, _) = fixture();
        assert_eq!(
            login(&pipeline, "", "password").unwrap_err(),
            Rejection::Malformed
        );
        assert_eq!(
            login(&pipeline, "alice", "").unwrap_err(),
            Rejection::Malformed
        );
    }

    #[test]
    fn lockout_after_threshold_rejects_even_correct_password() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        for _ in 0..5 {
            assert_eq!(
                login(&pipeline, "alice", "wrong").unwrap_err(),
                Rejection::BadCredentials
            );
        }
        assert_eq!(store.count_of(SecurityEvent::AccountLockout), 1);
        assert!(pipeline.directory().find("alice").unwrap().locked);

        // The sixth attempt carries the right password and still fails.
        assert_eq!(
            login(&pipeline, "alice", "alice-password").unwrap_err(),
            Rejection::AccountLocked
        );
        assert_eq!(store.count_of(SecurityEvent::AuthenticationSuccess), 0);
    }

    #[test]
    fn explicit_unlock_restores_access() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        for _ in 0..5 {
            let _ = login(&pipeline, "alice", "wrong");
        }
        assert_eq!(
            login(&pipeline, "alice", "alice-password").unwrap_err(),
            Rejection::AccountLocked
        );

        pipeline.guard().unlock("alice");
        pipeline.directory().set_locked("alice", false).unwrap();

        assert!(login(&pipeline, "alice", "alice-password").is_ok());
    }

    #[test]
    fn disabled_account_cannot_login() {
        let (pipeline, store) = fixture();
        let credential = pipeline.passwords().hash("carol-password").unwrap();
        seed_with(
            &pipeline,
            IdentityRecord::new("carol", credential, vec![Role::User]).with_enabled(false),
        );

        assert_eq!(
            login(&pipeline, "carol", "carol-password").unwrap_err(),
            Rejection::AccountDisabled
        );
        assert_eq!(store.count_of(SecurityEvent::AuthenticationFailure), 1);
    }

    #[test]
    fn admit_requires_token_on_protected_routes() {
        let (pipeline, _) = fixture();
        let decision = pipeline.admit_at(&descriptor("/auth/whoami", None), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::MissingToken)
        ));
    }

    #[test]
    fn admit_rejects_garbage_and_expired_tokens() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        let decision = pipeline.admit_at(&descriptor("/auth/whoami", Some("garbage")), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::InvalidToken)
        ));

        let expired = pipeline.tokens().issue("alice", NOW - 200_000).unwrap();
        let decision = pipeline.admit_at(&descriptor("/auth/whoami", Some(&expired)), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::InvalidToken)
        ));
    }

    #[test]
    fn admit_attaches_identity_on_valid_token() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        let token = pipeline.tokens().issue("alice", NOW).unwrap();

        let decision = pipeline.admit_at(&descriptor("/auth/whoami", Some(&token)), NOW);
        let Decision::Allowed(Some(identity)) = decision else {
            panic!("expected an allowed decision with identity");
        };
        assert_eq!(identity.subject, "alice");
        assert!(identity.has_role(Role::User));
        assert!(!identity.has_role(Role::Admin));
    }

    #[test]
    fn admit_rejects_tokens_for_unknown_subjects() {
        let (pipeline, store) = fixture();
        let token = pipeline.tokens().issue("ghost", NOW).unwrap();

        let decision = pipeline.admit_at(&descriptor("/auth/whoami", Some(&token)), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::AccountDisabled)
        ));
        assert_eq!(store.count_of(SecurityEvent::UnauthorizedAccess), 1);
    }

    #[test]
    fn admit_public_routes_ignore_bad_tokens() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        let decision = pipeline.admit_at(&descriptor("/health", Some("garbage")), NOW);
        assert!(matches!(decision, Decision::Allowed(None)));

        // A valid token on a public route still attaches its identity.
        let token = pipeline.tokens().issue("alice", NOW).unwrap();
        let decision = pipeline.admit_at(&descriptor("/health", Some(&token)), NOW);
        assert!(matches!(decision, Decision::Allowed(Some(_))));

        // Ignored tokens never produce security events.
        assert_eq!(store.count_of(SecurityEvent::UnauthorizedAccess), 0);
    }

    #[test]
    fn admit_enforces_roles() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        seed(&pipeline, "admin", "admin-password", vec![Role::Admin]);

        let alice = pipeline.tokens().issue("alice", NOW).unwrap();
        let decision = pipeline.admit_at(&descriptor("/admin/users", Some(&alice)), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::InsufficientRole)
        ));
        assert_eq!(store.count_of(SecurityEvent::UnauthorizedAccess), 1);

        let admin = pipeline.tokens().issue("admin", NOW).unwrap();
        let decision = pipeline.admit_at(&descriptor("/admin/users", Some(&admin)), NOW);
        assert!(matches!(decision, Decision::Allowed(Some(_))));
    }

    #[test]
    fn admit_normalizes_paths_before_matching() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        let token = pipeline.tokens().issue("alice", NOW).unwrap();

        // Duplicate slashes must not dodge the admin rule.
        let decision = pipeline.admit_at(&descriptor("//admin///users", Some(&token)), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::InsufficientRole)
        ));
    }

    #[test]
    fn forced_rotation_blocks_all_but_the_rotation_path() {
        let (pipeline, _) = fixture();
        let credential = pipeline.passwords().hash("bob-password").unwrap();
        seed_with(
            &pipeline,
            IdentityRecord::new("bob", credential, vec![Role::User]).with_must_rotate(true),
        );

        let grant = login(&pipeline, "bob", "bob-password").unwrap();
        assert!(grant.must_change_password);

        let decision = pipeline.admit_at(&descriptor("/auth/whoami", Some(&grant.token)), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::RotationRequired)
        ));

        let decision = pipeline.admit_at(&descriptor("/auth/password", Some(&grant.token)), NOW);
        assert!(matches!(decision, Decision::Allowed(Some(_))));
    }

    #[test]
    fn admit_rate_limits_per_client_and_class() {
        let (pipeline, store) = fixture();

        for _ in 0..5 {
            let decision = pipeline.admit_at(&descriptor("/auth/login", None), NOW);
            assert!(matches!(decision, Decision::Allowed(None)));
        }
        let decision = pipeline.admit_at(&descriptor("/auth/login", None), NOW);
        assert!(matches!(
            decision,
            Decision::Rejected(Rejection::RateLimited {
                limit_per_minute: 5,
                ..
            })
        ));
        assert_eq!(store.count_of(SecurityEvent::RateLimitExceeded), 1);

        // Another client is not affected.
        let other = RequestDescriptor {
            client_addr: "198.51.100.9".to_string(),
            ..descriptor("/auth/login", None)
        };
        assert!(matches!(
            pipeline.admit_at(&other, NOW),
            Decision::Allowed(None)
        ));
    }

    #[test]
    fn rotate_credential_requires_matching_old_password() {
        let (pipeline, store) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);

        assert_eq!(
            pipeline.rotate_credential("alice", "wrong", "new-password-1", &ctx()),
            Err(Rejection::CredentialMismatch)
        );

        pipeline
            .rotate_credential("alice", "alice-password", "new-password-1", &ctx())
            .unwrap();
        assert_eq!(store.count_of(SecurityEvent::PasswordChange), 1);

        assert!(login(&pipeline, "alice", "new-password-1").is_ok());
        assert_eq!(
            login(&pipeline, "alice", "alice-password").unwrap_err(),
            Rejection::BadCredentials
        );
    }

    #[test]
    fn rotate_credential_skips_old_check_when_forced() {
        let (pipeline, _) = fixture();
        let credential = pipeline.passwords().hash("bob-password").unwrap();
        seed_with(
            &pipeline,
            IdentityRecord::new("bob", credential, vec![Role::User]).with_must_rotate(true),
        );

        pipeline
            .rotate_credential("bob", "", "brand-new-password", &ctx())
            .unwrap();
        assert!(!pipeline.directory().find("bob").unwrap().must_rotate);
        assert!(login(&pipeline, "bob", "brand-new-password").is_ok());
    }

    #[test]
    fn rotate_credential_enforces_minimum_length() {
        let (pipeline, _) = fixture();
        seed(&pipeline, "alice", "alice-password", vec![Role::User]);
        assert_eq!(
            pipeline.rotate_credential("alice", "alice-password", "short", &ctx()),
            Err(Rejection::Malformed)
        );
    }

    #[test]
    fn rotate_credential_for_missing_subject() {
        let (pipeline, _) = fixture();
        assert_eq!(
            pipeline.rotate_credential("ghost", "old", "new-password-1", &ctx()),
            Err(Rejection::AccountDisabled)
        );
    }

    #[test]
    fn access_records_reach_the_store() {
        let (pipeline, store) = fixture();
        let context = descriptor("/health", None).audit_context();
        pipeline.record_access(&context, Some("alice"), 200, 7);

        let accesses = store.accesses.lock().unwrap();
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].path, "/health");
        assert_eq!(accesses[0].status, 200);
        assert_eq!(accesses[0].latency_ms, 7);
    }
}
