//! `Relay` builder and event loop.
//!
//! This is the composition root: it ties together the supervisor, the
//! notifier and the bridge router, and pumps game events until the game
//! side goes away.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mcrelay_bridge::{
    BridgeError, BridgeRouter, ChannelNotifier, ChatChannel, DiscordMessage, ResponseGenerator,
    Routed,
};
use mcrelay_session::{
    ConnectParams, GameEvent, GameSession, SessionContext, SessionError, SessionFactory,
};
use mcrelay_supervisor::{spawn_supervisor, SupervisorError, SupervisorHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::commands;
use crate::config::RelayConfig;
use crate::RelayError;

/// How often idle rate-limit entries are swept.
const EVICT_INTERVAL: Duration = Duration::from_secs(600);

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,ignore
/// use mcrelay::prelude::*;
///
/// let config = RelayConfig::load(Some(Path::new("settings.json")))?;
/// let relay = Relay::builder()
///     .config(config)
///     .build(my_factory, my_channel, my_generator)?;
/// relay.run().await
/// ```
pub struct RelayBuilder {
    config: RelayConfig,
}

impl RelayBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: RelayConfig::default(),
        }
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the config, spawns the supervisor (the first connect
    /// starts right away) and wires up the bridge.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build<F, C, G>(
        self,
        factory: F,
        channel: Arc<C>,
        generator: Arc<G>,
    ) -> Result<Relay<F, C, G>, RelayError>
    where
        F: SessionFactory,
        C: ChatChannel,
        G: ResponseGenerator,
    {
        self.config.validate()?;

        let (notifier, notifier_task) = ChannelNotifier::spawn(Arc::clone(&channel));
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let params = self.config.connect_params();
        info!(target_server = %params, "starting relay");

        let (handle, supervisor_task) = spawn_supervisor(
            Arc::new(factory),
            params,
            self.config.supervisor_config(),
            Arc::new(notifier),
            game_tx,
        );
        let router = Arc::new(BridgeRouter::new(
            handle.clone(),
            Arc::clone(&channel),
            generator,
            self.config.bridge_config(),
        ));

        Ok(Relay {
            config: self.config,
            handle,
            router,
            channel,
            game_events: tokio::sync::Mutex::new(game_rx),
            tasks: Mutex::new(vec![supervisor_task, notifier_task]),
        })
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running relay.
///
/// Call [`run()`](Self::run) to start pumping game events. Discord messages
/// come in through [`on_discord_message`](Self::on_discord_message), which
/// can be called from other tasks while `run` is going; share the relay in
/// an `Arc` for that.
pub struct Relay<F: SessionFactory, C, G> {
    config: RelayConfig,
    handle: SupervisorHandle<F::Session>,
    router: Arc<BridgeRouter<F::Session, C, G>>,
    channel: Arc<C>,
    /// Held by `run` for as long as it pumps.
    game_events: tokio::sync::Mutex<mpsc::UnboundedReceiver<GameEvent>>,
    /// Supervisor first, then notifier; emptied by `shutdown`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Relay<Unconfigured, (), ()> {
    /// Creates a new builder.
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }
}

impl<F, C, G> Relay<F, C, G>
where
    F: SessionFactory,
    C: ChatChannel,
    G: ResponseGenerator,
{
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle to the connection supervisor.
    pub fn handle(&self) -> &SupervisorHandle<F::Session> {
        &self.handle
    }

    pub fn router(&self) -> &Arc<BridgeRouter<F::Session, C, G>> {
        &self.router
    }

    /// Handles one message from the Discord channel: commands go to
    /// [`commands::dispatch`], everything else is bridged into the game.
    ///
    /// Problems the user should hear about (too long, bot offline) are
    /// answered in the channel rather than returned.
    pub async fn on_discord_message(&self, message: &DiscordMessage) -> Result<(), RelayError> {
        if message.author_is_bot {
            return Ok(());
        }

        let prefix = &self.config.discord.command_prefix;
        if let Some(rest) = message.content.strip_prefix(prefix.as_str()) {
            let (command, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            debug!(author = %message.author, command, "admin command");
            let reply = commands::dispatch(&self.handle, command, args).await?;
            self.channel.send(&reply).await?;
            return Ok(());
        }

        match self.router.on_discord_message(message).await {
            Ok(Routed::Forwarded | Routed::Ignored) => Ok(()),
            Err(BridgeError::MessageTooLong { max, .. }) => {
                self.channel
                    .send(&format!(
                        "❌ Message too long for Minecraft chat (max {max} characters)"
                    ))
                    .await?;
                Ok(())
            }
            Err(BridgeError::Supervisor(SupervisorError::NotConnected)) => {
                let lower = message.content.to_lowercase();
                if lower.contains("bot") || lower.contains("minecraft") {
                    self.channel
                        .send("⚠️ Minecraft bot is currently offline")
                        .await?;
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pumps game events into the bridge router until the supervisor stops
    /// or the event stream closes, then shuts everything down.
    ///
    /// # Errors
    /// [`RelayError::AlreadyRunning`] if another `run` is in progress.
    pub async fn run(&self) -> Result<(), RelayError> {
        let mut game_events = self
            .game_events
            .try_lock()
            .map_err(|_| RelayError::AlreadyRunning)?;
        info!("relay running");
        let mut evict = tokio::time::interval(EVICT_INTERVAL);
        evict.tick().await;

        loop {
            tokio::select! {
                event = game_events.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.router.on_game_event(event).await {
                        warn!(error = %e, "failed to route game event");
                    }
                }
                _ = evict.tick() => {
                    let evicted = self.router.evict_idle(EVICT_INTERVAL);
                    debug!(evicted, "swept rate limiter");
                }
                _ = self.handle.closed() => {
                    warn!("connection supervisor stopped");
                    break;
                }
            }
        }

        self.shutdown().await;
        info!("relay stopped");
        Ok(())
    }

    /// Stops the supervisor (quitting the session) and waits for queued
    /// notifications to be posted. Later calls return right away.
    pub async fn shutdown(&self) {
        let _ = self.handle.shutdown().await;
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        // The notifier ends once the supervisor's sink is gone.
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// Stand-in type parameter for [`Relay::builder`], so the builder can be
/// reached before the real factory type is known. Never constructed.
#[doc(hidden)]
pub enum Unconfigured {}

impl GameSession for Unconfigured {
    fn username(&self) -> &str {
        match *self {}
    }

    fn chat(&self, _message: &str) -> Result<(), SessionError> {
        match *self {}
    }

    fn quit(&self) {
        match *self {}
    }
}

impl SessionFactory for Unconfigured {
    type Session = Unconfigured;

    async fn create_session(
        &self,
        _params: &ConnectParams,
        _context: SessionContext,
    ) -> Result<Unconfigured, SessionError> {
        match *self {}
    }
}
