//! Handle for talking to a running supervisor actor.

use std::sync::Arc;

use mcrelay_session::GameSession;
use tokio::sync::{mpsc, oneshot};

use crate::{SupervisorError, SupervisorStatus};

/// Commands sent to the supervisor actor through its channel.
///
/// Variants with a `reply` carry a oneshot "reply channel": the handle
/// sends the command and waits for the answer on it.
pub(crate) enum SupervisorCommand<S: GameSession> {
    /// Drop everything and reconnect from attempt 1.
    ForceReconnect { reply: oneshot::Sender<()> },

    /// Snapshot of the connection state.
    Status {
        reply: oneshot::Sender<SupervisorStatus>,
    },

    /// The spawned session, if there is one.
    CurrentSession {
        reply: oneshot::Sender<Option<Arc<S>>>,
    },

    /// Public chat through the live session.
    Chat {
        message: String,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },

    /// Private message through the live session.
    Whisper {
        to: String,
        message: String,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },

    /// Quit the session and stop the actor.
    Shutdown,
}

/// Handle to a running connection supervisor.
///
/// Cheap to clone; every component that needs the game connection gets
/// one. The session itself never leaves the actor except as a short-lived
/// [`current_session`](Self::current_session) lookup, so a reconnect can
/// replace it at any time without anyone holding a stale copy.
pub struct SupervisorHandle<S: GameSession> {
    sender: mpsc::Sender<SupervisorCommand<S>>,
}

impl<S: GameSession> Clone for SupervisorHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: GameSession> SupervisorHandle<S> {
    pub(crate) fn new(sender: mpsc::Sender<SupervisorCommand<S>>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorCommand<S>,
    ) -> Result<T, SupervisorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| SupervisorError::Unavailable)?;
        reply_rx.await.map_err(|_| SupervisorError::Unavailable)
    }

    /// Cancels any pending retry, resets the attempt counter, and schedules
    /// a fresh attempt. Works from every state, including `Exhausted` and
    /// `Fatal`.
    pub async fn force_reconnect(&self) -> Result<(), SupervisorError> {
        self.request(|reply| SupervisorCommand::ForceReconnect { reply })
            .await
    }

    /// Read-only snapshot of the connection state.
    pub async fn status(&self) -> Result<SupervisorStatus, SupervisorError> {
        self.request(|reply| SupervisorCommand::Status { reply }).await
    }

    /// The spawned session, for one immediate use.
    ///
    /// Don't keep the `Arc` around: after a reconnect it points at a dead
    /// session. Ask again next time.
    pub async fn current_session(&self) -> Result<Option<Arc<S>>, SupervisorError> {
        self.request(|reply| SupervisorCommand::CurrentSession { reply })
            .await
    }

    /// Sends a public chat line through whichever session is live now.
    ///
    /// # Errors
    /// - [`SupervisorError::NotConnected`] — no spawned session
    /// - [`SupervisorError::Session`] — the session refused the message
    pub async fn chat(&self, message: impl Into<String>) -> Result<(), SupervisorError> {
        let message = message.into();
        self.request(|reply| SupervisorCommand::Chat { message, reply })
            .await?
    }

    /// Sends a private message through whichever session is live now.
    pub async fn whisper(
        &self,
        to: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        let (to, message) = (to.into(), message.into());
        self.request(|reply| SupervisorCommand::Whisper { to, message, reply })
            .await?
    }

    /// Asks the actor to quit the session and stop.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.sender
            .send(SupervisorCommand::Shutdown)
            .await
            .map_err(|_| SupervisorError::Unavailable)
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Waits until the actor has stopped.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
