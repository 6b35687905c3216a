//! Per-key cooldown rate limiting for mcrelay.
//!
//! The bridge uses this to keep AI replies from flooding the game chat: a
//! key (a player name, or one global key) may act once, then has to wait
//! out a cooldown before acting again.
//!
//! # Concurrency note
//!
//! `RateLimiter` is a plain `HashMap` and is not thread-safe by itself.
//! The owner wraps it in a mutex or keeps it on a single task.
//!
//! Timestamps come from [`tokio::time::Instant`], so tests can pause and
//! advance the clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks the last permitted action per key.
///
/// ```text
/// try_acquire(k) ──→ true   (first time, or cooldown elapsed; timestamp updated)
///                └─→ false  (inside the cooldown; nothing changes)
/// ```
#[derive(Debug)]
pub struct RateLimiter<K> {
    last_action: HashMap<K, Instant>,
}

impl<K: Eq + Hash> RateLimiter<K> {
    pub fn new() -> Self {
        Self {
            last_action: HashMap::new(),
        }
    }

    /// Returns `true` and records the action if `key` has never acted, or
    /// if at least `cooldown` has passed since it last did.
    ///
    /// A denied call leaves the stored timestamp alone, so hammering a
    /// limited key doesn't extend its cooldown.
    pub fn try_acquire(&mut self, key: K, cooldown: Duration) -> bool {
        let now = Instant::now();
        match self.last_action.get(&key) {
            Some(last) if now.duration_since(*last) < cooldown => false,
            _ => {
                self.last_action.insert(key, now);
                true
            }
        }
    }

    /// Time left before `key` may act again. Zero if it may act now.
    pub fn remaining(&self, key: &K, cooldown: Duration) -> Duration {
        self.last_action
            .get(key)
            .map(|last| cooldown.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Forgets `key`, so its next action is permitted.
    pub fn reset(&mut self, key: &K) {
        self.last_action.remove(key);
    }

    /// Drops entries that haven't acted for at least `max_idle`.
    ///
    /// Returns how many were dropped. Call it now and then to bound memory
    /// when keys are player names.
    pub fn evict_idle(&mut self, max_idle: Duration) -> usize {
        let before = self.last_action.len();
        self.last_action.retain(|_, last| last.elapsed() < max_idle);
        let evicted = before - self.last_action.len();
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = self.last_action.len(),
                "evicted idle rate limit entries"
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.last_action.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_action.is_empty()
    }
}

impl<K: Eq + Hash> Default for RateLimiter<K> {
    fn default() -> Self {
        Self::new()
    }
}
