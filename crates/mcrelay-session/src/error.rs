//! Error types for the session layer.

/// Errors produced by a game session or the factory that creates it.
///
/// The `Display` text matters: the supervisor's fatal-error classifier
/// matches on it, so authentication problems must keep the
/// "authentication failed" wording.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The server could not be reached or the login sequence broke off.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The server or auth provider rejected the account.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The session already ended; it can no longer send anything.
    #[error("session is no longer alive")]
    NotAlive,

    /// Writing to the game connection failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}
