//! Identity lookup contract and the in-memory directory.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::policy::Role;

/// One identity as the pipeline sees it. `credential` is a tagged hash,
/// never a plaintext password.
#[derive(Clone, Debug)]
pub struct IdentityRecord {
    pub subject: String,
    pub user_id: Uuid,
    pub credential: String,
    pub enabled: bool,
    pub locked: bool,
    pub roles: Vec<Role>,
    pub must_rotate: bool,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl IdentityRecord {
    #[must_use]
    pub fn new(subject: impl Into<String>, credential: String, roles: Vec<Role>) -> Self {
        Self {
            subject: normalize_subject(&subject.into()),
            user_id: Uuid::new_v4(),
            credential,
            enabled: true,
            locked: false,
            roles,
            must_rotate: false,
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_must_rotate(mut self, must_rotate: bool) -> Self {
        self.must_rotate = must_rotate;
        self
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("subject already exists")]
    AlreadyExists,
    #[error("subject not found")]
    NotFound,
}

/// Lookup and bookkeeping contract the pipeline depends on.
///
/// Implementations decide where records live; the pipeline reads snapshots
/// and reports state changes back through the setters.
pub trait IdentityDirectory: Send + Sync {
    fn find(&self, subject: &str) -> Option<IdentityRecord>;
    fn create(&self, record: IdentityRecord) -> Result<(), DirectoryError>;
    fn delete(&self, subject: &str) -> Result<(), DirectoryError>;
    fn set_locked(&self, subject: &str, locked: bool) -> Result<(), DirectoryError>;
    fn set_roles(&self, subject: &str, roles: Vec<Role>) -> Result<(), DirectoryError>;
    /// Replace the stored credential and clear the rotation requirement.
    fn update_credential(&self, subject: &str, credential: String) -> Result<(), DirectoryError>;
    fn record_login(&self, subject: &str, at: OffsetDateTime) -> Result<(), DirectoryError>;
}

/// Normalize a subject for lookup and uniqueness checks.
#[must_use]
pub fn normalize_subject(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// In-memory directory used by the server and the tests.
#[derive(Default)]
pub struct MemoryDirectory {
    records: DashMap<String, IdentityRecord>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn find(&self, subject: &str) -> Option<IdentityRecord> {
        self.records
            .get(&normalize_subject(subject))
            .map(|record| record.clone())
    }

    fn create(&self, record: IdentityRecord) -> Result<(), DirectoryError> {
        match self.records.entry(record.subject.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::AlreadyExists),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    fn delete(&self, subject: &str) -> Result<(), DirectoryError> {
        self.records
            .remove(&normalize_subject(subject))
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }

    fn set_locked(&self, subject: &str, locked: bool) -> Result<(), DirectoryError> {
        let mut record = self
            .records
            .get_mut(&normalize_subject(subject))
            .ok_or(DirectoryError::NotFound)?;
        record.locked = locked;
        Ok(())
    }

    fn set_roles(&self, subject: &str, roles: Vec<Role>) -> Result<(), DirectoryError> {
        let mut record = self
            .records
            .get_mut(&normalize_subject(subject))
            .ok_or(DirectoryError::NotFound)?;
        record.roles = roles;
        Ok(())
    }

    fn update_credential(&self, subject: &str, credential: String) -> Result<(), DirectoryError> {
        let mut record = self
            .records
            .get_mut(&normalize_subject(subject))
            .ok_or(DirectoryError::NotFound)?;
        record.credential = credential;
        record.must_rotate = false;
        Ok(())
    }

    fn record_login(&self, subject: &str, at: OffsetDateTime) -> Result<(), DirectoryError> {
        let mut record = self
            .records
            .get_mut(&normalize_subject(subject))
            .ok_or(DirectoryError::NotFound)?;
        record.last_login = Some(at);
        Ok(())
    }
}
