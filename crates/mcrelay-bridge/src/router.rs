//! Routes messages between the game and the Discord channel.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mcrelay_ratelimit::RateLimiter;
use mcrelay_session::{GameEvent, GameSession};
use mcrelay_supervisor::SupervisorHandle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::format::{
    death_line, discord_chat_line, game_chat_line, player_joined_line, player_left_line,
    reply_lines, DEFAULT_CHUNK_LEN, MAX_GAME_CHAT_LEN,
};
use crate::{AiRequest, AiRequestKind, BridgeError, ChatChannel, ResponseGenerator};

/// Bridge behaviour settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The bot's own in-game name; its chat lines are not relayed.
    pub bot_username: String,
    /// Discord messages starting with this are commands, not chat.
    pub command_prefix: String,
    pub ai_enabled: bool,
    /// Minimum gap between AI replies per rate-limit key.
    pub chat_cooldown: Duration,
    /// Chat containing any of these (case-insensitive) asks for an AI reply.
    pub trigger_words: Vec<String>,
    /// Maximum characters per AI reply chunk, prefix excluded.
    pub chunk_len: usize,
    /// Pause between follow-up chunks of a long reply.
    pub follow_up_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bot_username: "RelayBot".to_string(),
            command_prefix: "!".to_string(),
            ai_enabled: true,
            chat_cooldown: Duration::from_millis(2_000),
            trigger_words: vec!["bot".to_string(), "ai".to_string()],
            chunk_len: DEFAULT_CHUNK_LEN,
            follow_up_delay: Duration::from_millis(2_000),
        }
    }
}

/// A message posted in the Discord channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordMessage {
    pub author: String,
    pub content: String,
    pub author_is_bot: bool,
}

impl DiscordMessage {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            author_is_bot: false,
        }
    }
}

/// What happened to a Discord message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Sent into game chat.
    Forwarded,
    /// Not meant for the game (bot author or command).
    Ignored,
}

/// Rate-limit keys: public chat replies share one key, whispers are keyed
/// per player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RateKey {
    Global,
    Player(String),
}

/// Moves chat between the game and Discord, and answers players with AI
/// replies.
///
/// Only ever reaches the game through the [`SupervisorHandle`], so it keeps
/// working across reconnects without holding on to any session.
pub struct BridgeRouter<S: GameSession, C, G> {
    handle: SupervisorHandle<S>,
    channel: Arc<C>,
    generator: Arc<G>,
    config: BridgeConfig,
    limiter: Mutex<RateLimiter<RateKey>>,
    deaths: AtomicU32,
}

impl<S, C, G> BridgeRouter<S, C, G>
where
    S: GameSession,
    C: ChatChannel,
    G: ResponseGenerator,
{
    pub fn new(
        handle: SupervisorHandle<S>,
        channel: Arc<C>,
        generator: Arc<G>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            handle,
            channel,
            generator,
            config,
            limiter: Mutex::new(RateLimiter::new()),
            deaths: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn handle(&self) -> &SupervisorHandle<S> {
        &self.handle
    }

    /// Bot deaths seen since the router was created.
    pub fn death_count(&self) -> u32 {
        self.deaths.load(Ordering::Relaxed)
    }

    // -- Game → Discord ---------------------------------------------------

    /// Relays one game event to Discord.
    ///
    /// AI replies run in their own task, so a slow generator never holds up
    /// the next event. A failed Discord post doesn't stop the reply.
    pub async fn on_game_event(&self, event: GameEvent) -> Result<(), BridgeError> {
        match event {
            GameEvent::Chat { username, message } => {
                if username == self.config.bot_username {
                    return Ok(());
                }
                info!(%username, %message, "game chat");
                let line = game_chat_line(&username, &message);
                if self.mentions_trigger(&message) && self.acquire(RateKey::Global) {
                    self.spawn_reply(AiRequest {
                        username,
                        message,
                        kind: AiRequestKind::Chat,
                    });
                }
                self.post(&line).await
            }
            GameEvent::Whisper { username, message } => {
                info!(%username, %message, "game whisper");
                if self.config.ai_enabled && self.acquire(RateKey::Player(username.clone())) {
                    self.spawn_reply(AiRequest {
                        username,
                        message,
                        kind: AiRequestKind::Whisper,
                    });
                }
                Ok(())
            }
            GameEvent::PlayerJoined { username } => {
                info!(%username, "player joined");
                self.post(&player_joined_line(&username)).await
            }
            GameEvent::PlayerLeft { username } => {
                info!(%username, "player left");
                self.post(&player_left_line(&username)).await
            }
            GameEvent::Death => {
                let count = self.deaths.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(death_count = count, "bot died");
                self.post(&death_line(count)).await
            }
        }
    }

    fn mentions_trigger(&self, message: &str) -> bool {
        if !self.config.ai_enabled {
            return false;
        }
        let lower = message.to_lowercase();
        self.config
            .trigger_words
            .iter()
            .any(|word| !word.is_empty() && lower.contains(&word.to_lowercase()))
    }

    fn acquire(&self, key: RateKey) -> bool {
        let permitted = self
            .limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(key.clone(), self.config.chat_cooldown);
        if !permitted {
            debug!(?key, "AI reply suppressed by cooldown");
        }
        permitted
    }

    /// Drops idle rate-limit entries. Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        self.limiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evict_idle(max_idle)
    }

    async fn post(&self, line: &str) -> Result<(), BridgeError> {
        self.channel.send(line).await.inspect_err(|e| {
            warn!(error = %e, "failed to post to chat channel");
        })
    }

    /// Answers `request` in the background.
    ///
    /// Returns the task's handle; dropping it leaves the reply running.
    pub fn spawn_reply(&self, request: AiRequest) -> JoinHandle<()> {
        let handle = self.handle.clone();
        let generator = Arc::clone(&self.generator);
        let chunk_len = self.config.chunk_len;
        let follow_up_delay = self.config.follow_up_delay;
        tokio::spawn(async move {
            let username = request.username.clone();
            if let Err(e) = reply(&handle, &*generator, request, chunk_len, follow_up_delay).await
            {
                warn!(%username, error = %e, "AI reply not delivered");
            }
        })
    }

    // -- Discord → game ---------------------------------------------------

    /// Forwards a Discord message into game chat.
    ///
    /// # Errors
    /// - [`BridgeError::MessageTooLong`] — the formatted line exceeds the
    ///   game's chat limit
    /// - [`BridgeError::Supervisor`] — no live session, or it refused
    pub async fn on_discord_message(
        &self,
        message: &DiscordMessage,
    ) -> Result<Routed, BridgeError> {
        if message.author_is_bot || message.content.starts_with(&self.config.command_prefix) {
            return Ok(Routed::Ignored);
        }

        let line = discord_chat_line(&message.author, &message.content);
        let len = line.chars().count();
        if len > MAX_GAME_CHAT_LEN {
            return Err(BridgeError::MessageTooLong {
                len,
                max: MAX_GAME_CHAT_LEN,
            });
        }

        self.handle.chat(line).await?;
        debug!(author = %message.author, "forwarded discord message");
        Ok(Routed::Forwarded)
    }
}

/// Asks the generator and sends the answer into the game, one chunk every
/// `follow_up_delay`.
async fn reply<S: GameSession, G: ResponseGenerator>(
    handle: &SupervisorHandle<S>,
    generator: &G,
    request: AiRequest,
    chunk_len: usize,
    follow_up_delay: Duration,
) -> Result<(), BridgeError> {
    let Some(raw) = generator.generate(&request).await else {
        debug!(username = %request.username, "generator stayed silent");
        return Ok(());
    };
    let start = Instant::now();
    for (n, line) in (0u32..).zip(reply_lines(&raw, chunk_len)) {
        if n > 0 {
            tokio::time::sleep_until(start + follow_up_delay.saturating_mul(n)).await;
        }
        send_to_game(handle, &request, line).await?;
    }
    Ok(())
}

async fn send_to_game<S: GameSession>(
    handle: &SupervisorHandle<S>,
    request: &AiRequest,
    line: String,
) -> Result<(), BridgeError> {
    match request.kind {
        AiRequestKind::Chat => handle.chat(line).await?,
        AiRequestKind::Whisper => handle.whisper(request.username.as_str(), line).await?,
    }
    Ok(())
}
