//! Error types for the supervisor layer.

use mcrelay_session::SessionError;

/// Errors returned by [`SupervisorHandle`](crate::SupervisorHandle) calls.
///
/// Lifecycle problems never show up here; the supervisor handles those
/// itself and reports them as notifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    /// The supervisor's actor task has stopped.
    #[error("connection supervisor is unavailable")]
    Unavailable,

    /// No spawned session to act on right now.
    #[error("not connected to the game server")]
    NotConnected,

    /// The live session rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),
}
