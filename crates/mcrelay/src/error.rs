//! Unified error type for the relay.

use mcrelay_bridge::BridgeError;
use mcrelay_session::SessionError;
use mcrelay_supervisor::SupervisorError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Bad or unreadable configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A game session error (connect, auth, send).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The connection supervisor couldn't do what was asked.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// A bridge error (Discord post, message too long).
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// [`Relay::run`](crate::Relay::run) was called while already running.
    #[error("relay is already running")]
    AlreadyRunning,
}
