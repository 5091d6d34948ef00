//! Audit records for security events and request access.
//!
//! Two record shapes leave the pipeline: security events, tagged with a
//! severity derived from the event type, and access records, one per request
//! with status and latency. Emission is infallible by contract; a store that
//! loses a record logs and moves on. Callers pass identifiers and outcome
//! details only, never raw credentials.

use std::sync::Arc;

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use ulid::Ulid;

/// Severity attached to every security event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Security event taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityEvent {
    AuthenticationSuccess,
    AuthenticationFailure,
    AccountLockout,
    PasswordChange,
    UnauthorizedAccess,
    RateLimitExceeded,
    SuspiciousActivity,
    ConfigurationChange,
    UserCreation,
    UserDeletion,
    PrivilegeEscalation,
}

impl SecurityEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "AUTHENTICATION_SUCCESS",
            Self::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            Self::AccountLockout => "ACCOUNT_LOCKOUT",
            Self::PasswordChange => "PASSWORD_CHANGE",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::ConfigurationChange => "CONFIGURATION_CHANGE",
            Self::UserCreation => "USER_CREATION",
            Self::UserDeletion => "USER_DELETION",
            Self::PrivilegeEscalation => "PRIVILEGE_ESCALATION",
        }
    }

    /// Severity the event carries.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::AuthenticationFailure
            | Self::AccountLockout
            | Self::UnauthorizedAccess
            | Self::SuspiciousActivity
            | Self::UserDeletion
            | Self::PrivilegeEscalation => Severity::High,
            Self::RateLimitExceeded | Self::ConfigurationChange => Severity::Medium,
            Self::AuthenticationSuccess | Self::PasswordChange | Self::UserCreation => {
                Severity::Low
            }
        }
    }
}

/// Request-scoped fields copied onto every record.
#[derive(Clone, Debug, Default)]
pub struct AuditContext {
    pub client_addr: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

/// One immutable security event record.
#[derive(Clone, Debug)]
pub struct SecurityRecord {
    pub id: String,
    pub timestamp: String,
    pub event: SecurityEvent,
    pub severity: Severity,
    pub actor: String,
    pub context: AuditContext,
    pub detail: Value,
}

/// One access record, emitted for every request that reached the service.
#[derive(Clone, Debug)]
pub struct AccessRecord {
    pub timestamp: String,
    pub client_addr: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: u128,
    pub actor: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

/// Where finished records go. Implementations must not panic.
pub trait AuditStore: Send + Sync {
    fn security(&self, record: &SecurityRecord);
    fn access(&self, record: &AccessRecord);
}

/// Default store: structured log lines, one per record, level by severity.
pub struct LogStore;

impl AuditStore for LogStore {
    fn security(&self, record: &SecurityRecord) {
        let client = record.context.client_addr.as_deref().unwrap_or("unknown");
        let request_id = record.context.request_id.as_deref().unwrap_or("-");
        match record.severity {
            Severity::High => error!(
                target: "security",
                id = %record.id,
                severity = record.severity.as_str(),
                actor = %record.actor,
                client = %client,
                request_id = %request_id,
                detail = %record.detail,
                "{}", record.event.as_str()
            ),
            Severity::Medium => warn!(
                target: "security",
                id = %record.id,
                severity = record.severity.as_str(),
                actor = %record.actor,
                client = %client,
                request_id = %request_id,
                detail = %record.detail,
                "{}", record.event.as_str()
            ),
            Severity::Low => info!(
                target: "security",
                id = %record.id,
                severity = record.severity.as_str(),
                actor = %record.actor,
                client = %client,
                request_id = %request_id,
                detail = %record.detail,
                "{}", record.event.as_str()
            ),
        }
    }

    fn access(&self, record: &AccessRecord) {
        info!(
            target: "access",
            actor = record.actor.as_deref().unwrap_or("-"),
            request_id = record.request_id.as_deref().unwrap_or("-"),
            "{} {} {} {} {}ms",
            record.client_addr,
            record.method,
            record.path,
            record.status,
            record.latency_ms
        );
    }
}

/// Front door for audit emission. Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct AuditSink {
    store: Arc<dyn AuditStore>,
}

impl AuditSink {
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record a security event with the severity its type carries. A missing
    /// actor is recorded as `anonymous`.
    pub fn security_event(
        &self,
        event: SecurityEvent,
        actor: Option<&str>,
        context: &AuditContext,
        detail: Value,
    ) {
        let record = SecurityRecord {
            id: Ulid::new().to_string(),
            timestamp: now_rfc3339(),
            event,
            severity: event.severity(),
            actor: actor.unwrap_or("anonymous").to_string(),
            context: context.clone(),
            detail,
        };
        self.store.security(&record);
    }

    /// Record the access outcome for one request.
    pub fn access(&self, context: &AuditContext, actor: Option<&str>, status: u16, latency_ms: u128) {
        let record = AccessRecord {
            timestamp: now_rfc3339(),
            client_addr: context
                .client_addr
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            method: context.method.clone().unwrap_or_default(),
            path: context.path.clone().unwrap_or_default(),
            status,
            latency_ms,
            actor: actor.map(str::to_string),
            user_agent: context.user_agent.clone(),
            request_id: context.request_id.clone(),
        };
        self.store.access(&record);
    }
}

// Emission must not fail; an empty timestamp beats a panic in the audit path.
fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{AccessRecord, AuditStore, SecurityEvent, SecurityRecord};
    use std::sync::Mutex;

    /// Store that keeps records in memory for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingStore {
        pub(crate) events: Mutex<Vec<SecurityRecord>>,
        pub(crate) accesses: Mutex<Vec<AccessRecord>>,
    }

    impl RecordingStore {
        pub(crate) fn events_of(&self, event: SecurityEvent) -> Vec<SecurityRecord> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|record| record.event == event)
                .cloned()
                .collect()
        }

        pub(crate) fn count_of(&self, event: SecurityEvent) -> usize {
            self.events_of(event).len()
        }
    }

    impl AuditStore for RecordingStore {
        fn security(&self, record: &SecurityRecord) {
            self.events.lock().unwrap().push(record.clone());
        }

        fn access(&self, record: &AccessRecord) {
            self.accesses.lock().unwrap().push(record.clone());
        }
    }
}
