//! Events a game session emits, and the senders it emits them through.
//!
//! Two streams leave a session:
//!
//! - **Lifecycle events** ([`LifecycleEvent`]) go to the connection
//!   supervisor. Each one is stamped with the [`SessionGeneration`] of the
//!   session that produced it, so the supervisor can drop events from a
//!   session it has already replaced.
//! - **Game events** ([`GameEvent`]) go to the bridge router: chat, joins,
//!   leaves, deaths. These don't affect connection state.

use std::fmt;

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// SessionGeneration
// ---------------------------------------------------------------------------

/// Identifies one session attempt. Bumped every time the supervisor
/// attaches handlers for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    /// The generation that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle events
// ---------------------------------------------------------------------------

/// Connection-level signals from a game session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The bot joined the world and is usable.
    Spawned,
    /// The connection ended, gracefully or not.
    Terminated { reason: String },
    /// The client library reported an error.
    ErrorOccurred { message: String },
    /// The server kicked the bot.
    Kicked { reason: String },
}

impl LifecycleEvent {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Terminated { .. } => "terminated",
            Self::ErrorOccurred { .. } => "error",
            Self::Kicked { .. } => "kicked",
        }
    }
}

/// A lifecycle event together with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: SessionGeneration,
    pub event: LifecycleEvent,
}

/// Sender half handed to one session for reporting lifecycle events.
///
/// Every event sent through it carries the generation it was created for.
/// Once the supervisor moves on to a newer generation, events from this
/// sender still arrive but are ignored.
#[derive(Debug, Clone)]
pub struct LifecycleSender {
    generation: SessionGeneration,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl LifecycleSender {
    pub fn new(generation: SessionGeneration, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    /// Sends an event. Returns `false` if the supervisor has shut down.
    pub fn send(&self, event: LifecycleEvent) -> bool {
        tracing::trace!(generation = %self.generation, kind = event.kind(), "lifecycle event");
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn spawned(&self) -> bool {
        self.send(LifecycleEvent::Spawned)
    }

    pub fn terminated(&self, reason: impl Into<String>) -> bool {
        self.send(LifecycleEvent::Terminated {
            reason: reason.into(),
        })
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.send(LifecycleEvent::ErrorOccurred {
            message: message.into(),
        })
    }

    pub fn kicked(&self, reason: impl Into<String>) -> bool {
        self.send(LifecycleEvent::Kicked {
            reason: reason.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Game events
// ---------------------------------------------------------------------------

/// In-game happenings the bridge relays to Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// Public chat line.
    Chat { username: String, message: String },
    /// Private message addressed to the bot.
    Whisper { username: String, message: String },
    PlayerJoined { username: String },
    PlayerLeft { username: String },
    /// The bot itself died.
    Death,
}

/// Channel sender for delivering game events to the bridge.
pub type GameEventSender = mpsc::UnboundedSender<GameEvent>;

/// Everything a factory needs to wire a fresh session into the relay.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub lifecycle: LifecycleSender,
    pub game_events: GameEventSender,
}
