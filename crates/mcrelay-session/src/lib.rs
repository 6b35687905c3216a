//! Game session boundary for mcrelay.
//!
//! The relay doesn't speak the Minecraft protocol itself. A client library
//! does, and this crate describes what the relay needs from it:
//!
//! - [`SessionFactory`] — creates a new session for given [`ConnectParams`].
//! - [`GameSession`] — a live bot in the world: chat, whisper, quit.
//! - [`LifecycleEvent`] / [`GameEvent`] — what a session reports back,
//!   through the senders bundled in a [`SessionContext`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Supervisor (above)  ← creates sessions, consumes lifecycle events
//!     ↕
//! Session boundary (this crate)
//!     ↕
//! Minecraft client library (below, supplied by the binary)
//! ```

mod error;
mod event;

pub use error::SessionError;
pub use event::{
    GameEvent, GameEventSender, LifecycleEvent, LifecycleSender, SessionContext,
    SessionGeneration, TaggedEvent,
};

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// How the bot account logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Cracked/offline-mode servers: the username is all there is.
    #[default]
    Offline,
    /// Microsoft account login.
    Microsoft,
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth: AuthMode,
    /// Protocol version to announce. `None` lets the client auto-detect.
    #[serde(default)]
    pub version: Option<String>,
}

impl ConnectParams {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth: AuthMode::default(),
            version: None,
        }
    }

    /// `host:port`, for logs and status output.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// A live bot connection to the game server.
///
/// Methods are synchronous: client libraries queue outgoing packets and
/// return immediately. Implementations must be cheap to call from the
/// supervisor's actor task.
pub trait GameSession: Send + Sync + 'static {
    /// The in-game name of the bot.
    fn username(&self) -> &str;

    /// Sends a public chat line.
    fn chat(&self, message: &str) -> Result<(), SessionError>;

    /// Sends a private message. Defaults to the vanilla `/msg` command.
    fn whisper(&self, to: &str, message: &str) -> Result<(), SessionError> {
        self.chat(&format!("/msg {to} {message}"))
    }

    /// Disconnects. Must be idempotent; the session may already be gone.
    fn quit(&self);
}

/// Creates game sessions.
///
/// The factory receives a fresh [`SessionContext`] for every attempt. The
/// session it produces must report `Spawned` once it is in the world, and
/// `Terminated` / `ErrorOccurred` / `Kicked` when things go wrong, through
/// `context.lifecycle`.
///
/// Returning `Err` means the attempt failed before a session existed; the
/// supervisor classifies the error and retries or gives up.
///
/// # Example
///
/// ```rust
/// use mcrelay_session::{ConnectParams, GameSession, SessionContext, SessionError, SessionFactory};
///
/// struct Loopback;
///
/// impl GameSession for Loopback {
///     fn username(&self) -> &str { "Loopback" }
///     fn chat(&self, _message: &str) -> Result<(), SessionError> { Ok(()) }
///     fn quit(&self) {}
/// }
///
/// struct LoopbackFactory;
///
/// impl SessionFactory for LoopbackFactory {
///     type Session = Loopback;
///
///     async fn create_session(
///         &self,
///         _params: &ConnectParams,
///         context: SessionContext,
///     ) -> Result<Loopback, SessionError> {
///         context.lifecycle.spawned();
///         Ok(Loopback)
///     }
/// }
/// ```
pub trait SessionFactory: Send + Sync + 'static {
    /// The session type this factory produces.
    type Session: GameSession;

    /// Starts a new session attempt.
    fn create_session(
        &self,
        params: &ConnectParams,
        context: SessionContext,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
