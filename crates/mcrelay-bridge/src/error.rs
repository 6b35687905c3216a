//! Error types for the bridge layer.

use mcrelay_supervisor::SupervisorError;

/// Things that can go wrong while moving a message across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The Discord side refused or failed to post a message.
    #[error("failed to send to chat channel: {0}")]
    ChannelSend(String),

    /// The formatted line doesn't fit in one game chat message.
    #[error("message too long for game chat ({len} > {max} characters)")]
    MessageTooLong { len: usize, max: usize },

    /// The game side couldn't take the message.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}
