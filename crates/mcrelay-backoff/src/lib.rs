//! Reconnect backoff for mcrelay.
//!
//! Computes how long the connection supervisor waits before the next
//! reconnection attempt: exponential growth from a base delay, capped at a
//! ceiling, plus a small random jitter so several relays restarted together
//! don't hammer the server in lockstep.
//!
//! ```text
//! delay = min(base * 2^(attempt - 1), max) + jitter      jitter ∈ [0, max_jitter)
//! ```
//!
//! # Usage
//!
//! The free function [`compute_delay`] is the raw calculation in
//! milliseconds. [`Backoff`] wraps a validated [`BackoffConfig`] and hands
//! out [`Duration`]s, including [`Backoff::delay_with_floor`] for paths that
//! need a longer minimum wait (kicks).
//!
//! ```rust
//! use mcrelay_backoff::{Backoff, BackoffConfig};
//! use std::time::Duration;
//!
//! let backoff = Backoff::new(BackoffConfig {
//!     base_delay: Duration::from_millis(5_000),
//!     ..BackoffConfig::default()
//! });
//! let third = backoff.base_delay(3);
//! assert_eq!(third, Duration::from_millis(20_000));
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{trace, warn};

/// Upper bound (exclusive) of the random jitter added by [`compute_delay`].
pub const DEFAULT_JITTER_MS: u64 = 1_000;

/// Default ceiling for the exponential component.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

/// Default delay before the first reconnection attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Raw calculation
// ---------------------------------------------------------------------------

/// Exponential component of the delay, without jitter.
///
/// `attempt` 0 is treated like 1. The doubling saturates, so very large
/// attempt counts stay pinned at `max_delay_ms` instead of overflowing.
pub fn base_component(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponent = attempt.saturating_sub(1);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    base_delay_ms.saturating_mul(factor).min(max_delay_ms)
}

/// Delay in milliseconds before reconnection attempt number `attempt`.
///
/// Inputs are expected to be positive; validating them is the caller's job.
/// Jitter is drawn uniformly from `[0, 1000)` ms.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_component(attempt, base_delay_ms, max_delay_ms) + jitter_ms(DEFAULT_JITTER_MS)
}

fn jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..max_jitter_ms)
    }
}

fn to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for [`Backoff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay of the first attempt (before jitter).
    pub base_delay: Duration,
    /// Ceiling for the exponential component.
    pub max_delay: Duration,
    /// Jitter is drawn from `[0, max_jitter)`. Zero disables it.
    pub max_jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            max_jitter: Duration::from_millis(DEFAULT_JITTER_MS),
        }
    }
}

impl BackoffConfig {
    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Backoff::new`]. Rules:
    /// - `base_delay` and `max_delay` are at least 1 ms.
    /// - `max_delay` is raised to `base_delay` if it was smaller.
    pub fn validated(mut self) -> Self {
        let one_ms = Duration::from_millis(1);
        if self.base_delay < one_ms {
            warn!("backoff base_delay is zero, clamping to 1ms");
            self.base_delay = one_ms;
        }
        if self.max_delay < self.base_delay {
            warn!(
                base_ms = to_millis(self.base_delay),
                max_ms = to_millis(self.max_delay),
                "backoff max_delay below base_delay, raising to base"
            );
            self.max_delay = self.base_delay;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential backoff calculator with a validated config.
///
/// Stateless: the attempt counter lives with the caller (the supervisor
/// owns it), so the same `Backoff` can be shared freely.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    /// Delay before `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(base_component(
            attempt,
            to_millis(self.config.base_delay),
            to_millis(self.config.max_delay),
        ))
    }

    /// Delay before `attempt`, with jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_floor(attempt, Duration::ZERO)
    }

    /// Like [`delay`](Self::delay), but the non-jitter component is at least
    /// `floor`. The floor is not capped by `max_delay`.
    pub fn delay_with_floor(&self, attempt: u32, floor: Duration) -> Duration {
        let base = self.base_delay(attempt).max(floor);
        let jitter = Duration::from_millis(jitter_ms(to_millis(self.config.max_jitter)));
        trace!(
            attempt,
            base_ms = to_millis(base),
            jitter_ms = to_millis(jitter),
            "computed backoff delay"
        );
        base + jitter
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
