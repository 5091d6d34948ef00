//! Token-bucket rate limiting keyed by client address and endpoint class.
//!
//! Buckets are created lazily at full capacity and refill continuously,
//! clamped at capacity. A consumed token is not returned when the request
//! later fails or disconnects. Idle buckets are swept out after the idle TTL;
//! the map is also capped, and while it is full, keys that have no bucket yet
//! are refused instead of evicting live ones.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::request::EndpointClass;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Capacity and refill rate for one endpoint class, expressed per minute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateQuota {
    pub capacity: u32,
    pub refill_per_minute: u32,
}

impl RateQuota {
    /// Quota with burst capacity equal to the per-minute refill.
    #[must_use]
    pub const fn per_minute(value: u32) -> Self {
        Self {
            capacity: value,
            refill_per_minute: value,
        }
    }

    fn refill_per_second(self) -> f64 {
        f64::from(self.refill_per_minute) / 60.0
    }
}

#[derive(Clone, Copy, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Outcome of one rate-limit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Limited {
        retry_after_seconds: u64,
        limit_per_minute: u32,
    },
}

impl ThrottleDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Shared token-bucket store for all endpoint classes.
pub struct RateLimiter {
    auth: RateQuota,
    admin: RateQuota,
    general: RateQuota,
    idle_ttl: Duration,
    max_buckets: usize,
    buckets: DashMap<(String, EndpointClass), Bucket>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        auth: RateQuota,
        admin: RateQuota,
        general: RateQuota,
        idle_ttl: Duration,
        max_buckets: usize,
    ) -> Self {
        Self {
            auth,
            admin,
            general,
            idle_ttl,
            max_buckets,
            buckets: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    const fn quota(&self, class: EndpointClass) -> RateQuota {
        match class {
            EndpointClass::Auth => self.auth,
            EndpointClass::Admin => self.admin,
            EndpointClass::General => self.general,
        }
    }

    /// Try to take one token for `(actor, class)`.
    pub fn check(&self, actor: &str, class: EndpointClass) -> ThrottleDecision {
        self.check_at(actor, class, Instant::now())
    }

    pub(crate) fn check_at(
        &self,
        actor: &str,
        class: EndpointClass,
        now: Instant,
    ) -> ThrottleDecision {
        self.maybe_sweep(now);

        let quota = self.quota(class);
        let key = (actor.to_string(), class);

        // The cap is approximate under concurrency; it bounds memory, not
        // exact counts. Unseen keys are refused while the map is full.
        if self.buckets.len() >= self.max_buckets && !self.buckets.contains_key(&key) {
            return ThrottleDecision::Limited {
                retry_after_seconds: SWEEP_INTERVAL.as_secs(),
                limit_per_minute: quota.refill_per_minute,
            };
        }

        let mut bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            tokens: f64::from(quota.capacity),
            last_update: now,
        });

        let elapsed = now.duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * quota.refill_per_second()).min(f64::from(quota.capacity));
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return ThrottleDecision::Allowed;
        }

        ThrottleDecision::Limited {
            retry_after_seconds: retry_hint(quota, bucket.tokens),
            limit_per_minute: quota.refill_per_minute,
        }
    }

    fn maybe_sweep(&self, now: Instant) {
        // Losing the lock race just means another caller sweeps.
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < SWEEP_INTERVAL
            && self.buckets.len() < self.max_buckets
        {
            return;
        }
        *last_sweep = now;
        let idle_ttl = self.idle_ttl;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_update) < idle_ttl);
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Whole seconds until one token is available again, at least one.
fn retry_hint(quota: RateQuota, tokens: f64) -> u64 {
    let rate = quota.refill_per_second();
    if rate <= 0.0 {
        return SWEEP_INTERVAL.as_secs();
    }
    let seconds = ((1.0 - tokens) / rate).ceil();
    if seconds < 1.0 {
        1
    } else {
        seconds as u64
    }
}
