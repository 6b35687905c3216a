//! Notifications the supervisor emits for the surrounding program.
//!
//! The relay forwards these to the Discord channel; tests collect them
//! through an mpsc channel. Sinks are called from the supervisor's actor
//! task and must not block.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::SupervisorState;

/// Something worth telling an operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The bot spawned in the world.
    Connected { username: String, address: String },
    /// A live session ended.
    Disconnected { reason: String },
    /// A retry was scheduled.
    ReconnectScheduled {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    /// Too many failed attempts; retries stopped.
    Exhausted { attempts: u32 },
    /// An unrecoverable error; retries stopped.
    Fatal { reason: String },
}

impl Notification {
    /// `true` for the notifications after which nothing happens without a
    /// forced reconnect.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Fatal { .. })
    }

    /// The supervisor state this notification announces.
    pub fn state(&self) -> SupervisorState {
        match self {
            Self::Connected { .. } => SupervisorState::Connected,
            Self::Disconnected { .. } | Self::ReconnectScheduled { .. } => {
                SupervisorState::Reconnecting
            }
            Self::Exhausted { .. } => SupervisorState::Exhausted,
            Self::Fatal { .. } => SupervisorState::Fatal,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { username, address } => {
                write!(f, "connected to {address} as {username}")
            }
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
            Self::ReconnectScheduled {
                attempt,
                max_attempts,
                delay,
            } => write!(
                f,
                "reconnection attempt {attempt}/{max_attempts} in {:.1}s",
                delay.as_secs_f64()
            ),
            Self::Exhausted { attempts } => write!(
                f,
                "gave up after {attempts} reconnection attempts (state: {})",
                self.state()
            ),
            Self::Fatal { reason } => {
                write!(f, "not reconnecting: {reason} (state: {})", self.state())
            }
        }
    }
}

/// Receives supervisor notifications.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is listening; nothing to do.
        let _ = self.send(notification);
    }
}

/// Discards everything. The supervisor's own log lines still fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl NotificationSink for DiscardSink {
    fn notify(&self, _notification: Notification) {}
}
