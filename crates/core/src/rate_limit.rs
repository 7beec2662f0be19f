//! Per-client sliding-window request limiter.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_MAX_REQUESTS: usize = 5;
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Backing storage for request timestamps, keyed by client identifier.
pub trait RateLimitStore: Send {
    fn get(&self, client_id: &str) -> Vec<DateTime<Utc>>;

    fn set(&mut self, client_id: &str, timestamps: Vec<DateTime<Utc>>);

    /// Forgets every client whose newest timestamp is older than `cutoff`.
    /// Returns how many clients were removed.
    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: HashMap<String, Vec<DateTime<Utc>>>,
}

impl RateLimitStore for InMemoryStore {
    fn get(&self, client_id: &str) -> Vec<DateTime<Utc>> {
        self.entries.get(client_id).cloned().unwrap_or_default()
    }

    fn set(&mut self, client_id: &str, timestamps: Vec<DateTime<Utc>>) {
        self.entries.insert(client_id.to_string(), timestamps);
    }

    fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, ts| ts.last().is_some_and(|newest| *newest >= cutoff));
        before - self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::seconds(DEFAULT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until `reset_at`, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_at - now).num_milliseconds();
        ((millis + 999) / 1000).max(1)
    }
}

#[derive(Debug)]
pub struct SlidingWindowLimiter<S = InMemoryStore> {
    policy: RateLimitPolicy,
    store: Mutex<S>,
}

impl SlidingWindowLimiter<InMemoryStore> {
    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(InMemoryStore::default(), policy)
    }
}

impl<S: RateLimitStore> SlidingWindowLimiter<S> {
    pub fn new(store: S, policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            store: Mutex::new(store),
        }
    }

    /// Records a request for `client_id` at `now` unless the client is over its cap.
    /// Rejected attempts are not recorded.
    pub fn check(&self, client_id: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let RateLimitPolicy {
            max_requests,
            window,
        } = self.policy;

        // Held across get/set so concurrent checks for one client cannot both pass the cap.
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);

        let mut timestamps: Vec<DateTime<Utc>> = store
            .get(client_id)
            .into_iter()
            .filter(|ts| now - *ts < window)
            .collect();

        if timestamps.len() >= max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            store.set(client_id, timestamps);
            return RateLimitDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_at: oldest + window,
            };
        }

        timestamps.push(now);
        let count = timestamps.len();
        let oldest = timestamps[0];
        store.set(client_id, timestamps);

        RateLimitDecision {
            allowed: true,
            limit: max_requests,
            remaining: max_requests - count,
            reset_at: oldest + window,
        }
    }

    /// Drops clients with no request inside the window ending at `now`.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.prune(now - self.policy.window)
    }
}
