//! Supervisor configuration and state machine.

use std::time::Duration;

use mcrelay_backoff::{Backoff, BackoffConfig};
use serde::{Deserialize, Serialize};

use crate::FatalErrorClassifier;

// ---------------------------------------------------------------------------
// SupervisorConfig
// ---------------------------------------------------------------------------

/// Reconnection tunables.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Delay before the first reconnection attempt.
    pub base_reconnect_delay: Duration,

    /// Ceiling for the exponential part of the delay.
    pub max_reconnect_delay: Duration,

    /// Random jitter added on top, drawn from `[0, max_jitter)`.
    pub max_jitter: Duration,

    /// Attempts allowed since the last successful spawn before giving up.
    pub max_reconnect_attempts: u32,

    /// Kicks wait at least `base_reconnect_delay * kick_delay_multiplier`.
    pub kick_delay_multiplier: u32,

    /// Decides which errors are not worth retrying.
    pub classifier: FatalErrorClassifier,

    /// Capacity of the handle → actor command channel.
    pub command_channel_size: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_reconnect_delay: Duration::from_millis(5_000),
            max_reconnect_delay: Duration::from_millis(60_000),
            max_jitter: Duration::from_millis(1_000),
            max_reconnect_attempts: 10,
            kick_delay_multiplier: 3,
            classifier: FatalErrorClassifier::default(),
            command_channel_size: 64,
        }
    }
}

impl SupervisorConfig {
    /// The backoff calculator for these settings.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(BackoffConfig {
            base_delay: self.base_reconnect_delay,
            max_delay: self.max_reconnect_delay,
            max_jitter: self.max_jitter,
        })
    }

    /// Minimum (pre-jitter) delay after a kick.
    pub fn kick_delay_floor(&self) -> Duration {
        self.base_reconnect_delay.saturating_mul(self.kick_delay_multiplier)
    }
}

// ---------------------------------------------------------------------------
// SupervisorState
// ---------------------------------------------------------------------------

/// Where the supervisor is in the connection lifecycle.
///
/// ```text
///            spawned                 end / kick / error
///   Idle ─────────────→ Connected ─────────────────────→ Reconnecting
///                           ↑                              │   │
///                           └────────── spawned ───────────┘   │ attempts > max
///                                                              ▼
///   (any) ──fatal error──→ Fatal                           Exhausted
///
///   force_reconnect: (any) ──→ Reconnecting, attempt count reset
/// ```
///
/// - **Idle**: no session yet; the first connect attempt may be in flight.
/// - **Connected**: the bot spawned and is in the world.
/// - **Reconnecting**: a retry is scheduled or being attempted.
/// - **Exhausted**: gave up after too many attempts. Terminal until a
///   forced reconnect.
/// - **Fatal**: an unrecoverable error (ban, bad credentials, whitelist).
///   Terminal until a forced reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    Idle,
    Connected,
    Reconnecting,
    Exhausted,
    Fatal,
}

impl SupervisorState {
    /// Returns `true` for states that never leave on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Fatal)
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Fatal => write!(f, "Fatal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_config_default() {
        let config = SupervisorConfig::default();
        assert_eq!(config.base_reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.kick_delay_multiplier, 3);
    }

    #[test]
    fn test_kick_delay_floor_is_multiple_of_base() {
        let config = SupervisorConfig {
            base_reconnect_delay: Duration::from_millis(2_000),
            kick_delay_multiplier: 4,
            ..SupervisorConfig::default()
        };
        assert_eq!(config.kick_delay_floor(), Duration::from_millis(8_000));
    }

    #[test]
    fn test_backoff_uses_config_values() {
        let config = SupervisorConfig {
            base_reconnect_delay: Duration::from_millis(250),
            max_reconnect_delay: Duration::from_millis(1_000),
            ..SupervisorConfig::default()
        };
        let backoff = config.backoff();
        assert_eq!(backoff.base_delay(1), Duration::from_millis(250));
        assert_eq!(backoff.base_delay(5), Duration::from_millis(1_000));
    }

    #[test]
    fn test_supervisor_state_is_terminal() {
        assert!(!SupervisorState::Idle.is_terminal());
        assert!(!SupervisorState::Connected.is_terminal());
        assert!(!SupervisorState::Reconnecting.is_terminal());
        assert!(SupervisorState::Exhausted.is_terminal());
        assert!(SupervisorState::Fatal.is_terminal());
    }

    #[test]
    fn test_supervisor_state_display() {
        assert_eq!(SupervisorState::Reconnecting.to_string(), "Reconnecting");
        assert_eq!(SupervisorState::Fatal.to_string(), "Fatal");
    }
}
