//! Connection supervision for mcrelay.
//!
//! One supervisor owns the bot's game session. It connects, watches the
//! session's lifecycle events, and reconnects with exponential backoff when
//! the session dies, until it either gets back in or decides to stop.
//!
//! The supervisor runs as a Tokio task (actor model). Everything that
//! touches connection state (lifecycle events, retry timers, commands) is
//! a message to that task, so there is never more than one reconnection
//! cycle or more than one live session at a time.
//!
//! # Key types
//!
//! - [`ConnectionSupervisor`] — the state machine and actor loop
//! - [`SupervisorHandle`] — send commands to a running supervisor
//! - [`SupervisorState`] — lifecycle state machine
//! - [`SupervisorConfig`] — delays, attempt limit, fatal error policy
//! - [`FatalErrorClassifier`] — which errors are not worth retrying
//! - [`Notification`] / [`NotificationSink`] — what the supervisor reports

mod classify;
mod config;
mod error;
mod handle;
mod notify;
mod supervisor;

pub use classify::{FatalErrorClassifier, DEFAULT_FATAL_MATCHERS};
pub use config::{SupervisorConfig, SupervisorState};
pub use error::SupervisorError;
pub use handle::SupervisorHandle;
pub use notify::{DiscardSink, Notification, NotificationSink};
pub use supervisor::{spawn_supervisor, ConnectionSupervisor, SupervisorStatus};
