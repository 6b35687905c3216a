//! The chat bridge between the game and a Discord channel.
//!
//! # Key types
//!
//! - [`BridgeRouter`] — relays game events to Discord and Discord messages
//!   into the game, and answers players with AI replies
//! - [`ChatChannel`] — the Discord side
//! - [`ResponseGenerator`] — the AI side
//! - [`ChannelNotifier`] — posts supervisor notifications into the channel
//!
//! The router never holds a game session. Everything it sends into the game
//! goes through a [`SupervisorHandle`](mcrelay_supervisor::SupervisorHandle),
//! which answers for whichever session is live at that moment.

mod channel;
mod error;
pub mod format;
mod router;

pub use channel::{
    AiRequest, AiRequestKind, ChannelNotifier, ChatChannel, NoResponses, ResponseGenerator,
};
pub use error::BridgeError;
pub use router::{BridgeConfig, BridgeRouter, DiscordMessage, Routed};
