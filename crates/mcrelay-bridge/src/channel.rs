//! The two outside collaborators of the bridge: the Discord channel and
//! the AI response generator.
//!
//! Both are traits so the relay stays free of any particular Discord
//! client or LLM provider. The binary plugs in real implementations; tests
//! plug in recorders.

use std::future::Future;
use std::sync::Arc;

use mcrelay_supervisor::{Notification, NotificationSink};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::format::notification_line;
use crate::BridgeError;

/// The Discord text channel the relay posts into.
pub trait ChatChannel: Send + Sync + 'static {
    /// Posts one message.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), BridgeError>> + Send;
}

/// Whether a reply goes to public chat or back as a whisper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiRequestKind {
    Chat,
    Whisper,
}

/// One question for the response generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiRequest {
    pub username: String,
    pub message: String,
    pub kind: AiRequestKind,
}

/// Produces AI replies to in-game messages.
pub trait ResponseGenerator: Send + Sync + 'static {
    /// Returns the raw reply, or `None` to stay silent.
    ///
    /// Failures are the generator's business: log them and return `None`
    /// (or an apology line).
    fn generate(&self, request: &AiRequest) -> impl Future<Output = Option<String>> + Send;
}

/// A generator that never answers, for relays with AI turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResponses;

impl ResponseGenerator for NoResponses {
    async fn generate(&self, _request: &AiRequest) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// ChannelNotifier
// ---------------------------------------------------------------------------

/// Posts supervisor notifications into the chat channel.
///
/// `notify` runs on the supervisor's actor task and must not wait on
/// Discord, so lines are queued and a separate task posts them in order.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    lines: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    /// Starts the posting task. It ends once every notifier clone is gone.
    pub fn spawn<C: ChatChannel>(channel: Arc<C>) -> (Self, JoinHandle<()>) {
        let (lines, mut rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if let Err(e) = channel.send(&line).await {
                    warn!(error = %e, "failed to post status notification");
                }
            }
        });
        (Self { lines }, task)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.lines.send(notification_line(&notification));
    }
}
