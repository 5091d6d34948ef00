//! Failed-attempt tracking with a lockout threshold.
//!
//! Counters live per subject. Crossing the threshold locks the subject and is
//! reported exactly once; nothing unlocks automatically, an operator has to
//! clear the lock.

use dashmap::DashMap;

#[derive(Clone, Copy, Debug, Default)]
struct AttemptState {
    failed_attempts: u32,
    locked: bool,
}

/// Outcome of recording one failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempt counted; `remaining` more failures lock the subject.
    Counted { attempts: u32, remaining: u32 },
    /// This attempt crossed the threshold.
    JustLocked,
    /// The subject was already locked when the attempt arrived.
    AlreadyLocked,
}

/// Per-subject failure counters behind the authentication flow.
pub struct AccountGuard {
    threshold: u32,
    accounts: DashMap<String, AttemptState>,
}

impl AccountGuard {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            // A zero threshold would lock on the first failure ever seen.
            threshold: threshold.max(1),
            accounts: DashMap::new(),
        }
    }

    /// Record a failed attempt for `subject`.
    ///
    /// The entry is updated under its shard lock, so concurrent failures for
    /// one subject serialize and the `JustLocked` transition fires once.
    pub fn record_failure(&self, subject: &str) -> FailureOutcome {
        let mut state = self.accounts.entry(subject.to_string()).or_default();
        if state.locked {
            return FailureOutcome::AlreadyLocked;
        }
        state.failed_attempts = state.failed_attempts.saturating_add(1);
        if state.failed_attempts >= self.threshold {
            state.locked = true;
            FailureOutcome::JustLocked
        } else {
            FailureOutcome::Counted {
                attempts: state.failed_attempts,
                remaining: self.threshold - state.failed_attempts,
            }
        }
    }

    /// Reset the counter after a successful authentication. Locked subjects
    /// stay locked.
    pub fn record_success(&self, subject: &str) {
        if let Some(mut state) = self.accounts.get_mut(subject) {
            if !state.locked {
                state.failed_attempts = 0;
            }
        }
    }

    #[must_use]
    pub fn is_locked(&self, subject: &str) -> bool {
        self.accounts
            .get(subject)
            .is_some_and(|state| state.locked)
    }

    #[must_use]
    pub fn failed_attempts(&self, subject: &str) -> u32 {
        self.accounts
            .get(subject)
            .map_or(0, |state| state.failed_attempts)
    }

    /// Clear the lock and the counter. Returns whether the subject was locked.
    pub fn unlock(&self, subject: &str) -> bool {
        self.accounts
            .remove(subject)
            .is_some_and(|(_, state)| state.locked)
    }
}
