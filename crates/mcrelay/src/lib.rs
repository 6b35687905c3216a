//! # mcrelay
//!
//! Self-healing Minecraft bot to Discord chat relay.
//!
//! A bot account sits on a Minecraft server and relays chat both ways
//! between the game and a Discord channel, answering players with AI
//! replies when asked. When the connection drops, the relay reconnects on
//! its own with exponential backoff and stops only on errors that retrying
//! can't fix (bans, bad credentials) or after too many failed attempts.
//!
//! The Minecraft client, the Discord client and the AI provider are
//! plugged in through traits: [`SessionFactory`](prelude::SessionFactory),
//! [`ChatChannel`](prelude::ChatChannel) and
//! [`ResponseGenerator`](prelude::ResponseGenerator).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcrelay::prelude::*;
//!
//! // Implement the three traits for your clients, then:
//! // let config = RelayConfig::load(None)?;
//! // mcrelay::logging::init(&config)?;
//! // let relay = Relay::builder()
//! //     .config(config)
//! //     .build(my_factory, my_channel, my_generator)?;
//! // relay.run().await
//! ```

pub mod commands;
pub mod config;
mod error;
pub mod logging;
mod relay;

pub use error::RelayError;
pub use relay::{Relay, RelayBuilder, Unconfigured};

pub use mcrelay_backoff as backoff;
pub use mcrelay_bridge as bridge;
pub use mcrelay_ratelimit as ratelimit;
pub use mcrelay_session as session;
pub use mcrelay_supervisor as supervisor;

pub mod prelude {
    pub use crate::config::{ConfigError, RelayConfig};
    pub use crate::{Relay, RelayBuilder, RelayError};
    pub use mcrelay_bridge::{
        AiRequest, AiRequestKind, BridgeConfig, BridgeError, BridgeRouter, ChatChannel,
        DiscordMessage, NoResponses, ResponseGenerator, Routed,
    };
    pub use mcrelay_session::{
        AuthMode, ConnectParams, GameEvent, GameSession, LifecycleSender, SessionContext,
        SessionError, SessionFactory,
    };
    pub use mcrelay_supervisor::{
        Notification, NotificationSink, SupervisorConfig, SupervisorError, SupervisorHandle,
        SupervisorState, SupervisorStatus,
    };
}
