//! The connection supervisor: an actor that owns the game session.
//!
//! Every input arrives as a message and is handled to completion before
//! the next one:
//!
//! - lifecycle events from the current session (spawned, ended, kicked, error)
//! - retry timers firing
//! - connect attempts finishing
//! - commands from [`SupervisorHandle`]s
//!
//! Slow work (sleeping, calling the session factory) runs in spawned tasks
//! that report back through the same inbox, so the state below is only ever
//! touched from one place and needs no locks.

use std::sync::Arc;
use std::time::Duration;

use mcrelay_backoff::Backoff;
use mcrelay_session::{
    ConnectParams, GameEventSender, GameSession, LifecycleEvent, LifecycleSender,
    SessionContext, SessionError, SessionFactory, SessionGeneration, TaggedEvent,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::handle::SupervisorCommand;
use crate::{
    Notification, NotificationSink, SupervisorConfig, SupervisorError, SupervisorHandle,
    SupervisorState,
};

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// Identifies one scheduled retry. A `TimerFired` carrying any other id is
/// left over from a cancelled timer and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

/// A scheduled retry that can be cancelled.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    deadline: Instant,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Time left until the timer fires.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Stops the timer. Its `TimerFired` message will never be sent.
    pub fn cancel(self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the supervisor knows about the connection. Only the actor
/// touches it.
struct ConnectionState<S> {
    phase: SupervisorState,
    /// Attempts since the last successful spawn. Only
    /// [`ConnectionSupervisor::trigger_reconnect`] increments it.
    attempt_count: u32,
    /// Guard against two reconnection cycles at once. Set while a retry is
    /// scheduled or an attempt is in progress.
    is_reconnecting: bool,
    pending_timer: Option<TimerHandle>,
    active_session: Option<Arc<S>>,
    /// Lifecycle events from any other generation are stale.
    generation: SessionGeneration,
    /// An attempt for `generation` started and hasn't spawned yet.
    awaiting_spawn: bool,
    /// The factory call for `generation`, while it runs.
    connect_task: Option<JoinHandle<()>>,
    /// When the current session spawned.
    connected_since: Option<Instant>,
}

impl<S> ConnectionState<S> {
    fn new() -> Self {
        Self {
            phase: SupervisorState::Idle,
            attempt_count: 0,
            is_reconnecting: false,
            pending_timer: None,
            active_session: None,
            generation: SessionGeneration::default(),
            awaiting_spawn: false,
            connect_task: None,
            connected_since: None,
        }
    }
}

/// Read-only snapshot for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub is_reconnecting: bool,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub generation: u64,
    /// Time until the scheduled retry, if one is pending.
    pub next_retry_in: Option<Duration>,
    /// The bot's in-game name while connected.
    pub connected_as: Option<String>,
    /// How long the current session has been up.
    pub connected_for: Option<Duration>,
}

/// Messages that spawned helper tasks post back to the actor.
enum Internal<S> {
    TimerFired(TimerId),
    ConnectFinished {
        generation: SessionGeneration,
        result: Result<S, SessionError>,
    },
}

/// Why a session went away, for choosing the retry delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Ended,
    Kicked,
}

// ---------------------------------------------------------------------------
// ConnectionSupervisor
// ---------------------------------------------------------------------------

/// Owns the game session and keeps it connected.
///
/// Usually started with [`spawn_supervisor`], which runs it as a Tokio task.
/// The methods are public so the state machine can also be driven step by
/// step (see [`try_step`](Self::try_step)).
pub struct ConnectionSupervisor<F: SessionFactory> {
    factory: Arc<F>,
    params: ConnectParams,
    config: SupervisorConfig,
    backoff: Backoff,
    sink: Arc<dyn NotificationSink>,
    game_events: GameEventSender,
    state: ConnectionState<F::Session>,
    next_timer_id: u64,

    commands: mpsc::Receiver<SupervisorCommand<F::Session>>,
    lifecycle_tx: mpsc::UnboundedSender<TaggedEvent>,
    lifecycle_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    internal_tx: mpsc::UnboundedSender<Internal<F::Session>>,
    internal_rx: mpsc::UnboundedReceiver<Internal<F::Session>>,
}

impl<F: SessionFactory> ConnectionSupervisor<F> {
    /// Creates an idle supervisor and the first handle to it.
    ///
    /// Nothing connects until [`start`](Self::start) is called.
    pub fn new(
        factory: Arc<F>,
        params: ConnectParams,
        config: SupervisorConfig,
        sink: Arc<dyn NotificationSink>,
        game_events: GameEventSender,
    ) -> (Self, SupervisorHandle<F::Session>) {
        let (command_tx, commands) = mpsc::channel(config.command_channel_size.max(1));
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let backoff = config.backoff();

        let supervisor = Self {
            factory,
            params,
            config,
            backoff,
            sink,
            game_events,
            state: ConnectionState::new(),
            next_timer_id: 0,
            commands,
            lifecycle_tx,
            lifecycle_rx,
            internal_tx,
            internal_rx,
        };
        (supervisor, SupervisorHandle::new(command_tx))
    }

    // -- Public operations ------------------------------------------------

    /// Makes the first connect attempt. No-op unless idle with nothing in
    /// flight.
    pub fn start(&mut self) {
        if self.state.phase != SupervisorState::Idle
            || self.state.awaiting_spawn
            || self.state.is_reconnecting
        {
            return;
        }
        self.begin_attempt();
    }

    /// Issues the lifecycle sender for a new session.
    ///
    /// Bumps the generation, so every sender handed out before this one
    /// goes inert: its events still arrive but are ignored.
    pub fn attach_lifecycle_handlers(&mut self) -> LifecycleSender {
        self.state.generation = self.state.generation.next();
        debug!(generation = %self.state.generation, "attached lifecycle handlers");
        LifecycleSender::new(self.state.generation, self.lifecycle_tx.clone())
    }

    /// Cancels any pending retry, retires the current session, resets the
    /// attempt counter, and schedules attempt 1.
    pub fn force_reconnect(&mut self) {
        info!(state = %self.state.phase, "manual reconnection requested");
        self.cancel_timer();
        self.abort_connect();
        self.retire_session();
        self.state.attempt_count = 0;
        self.state.is_reconnecting = false;
        self.state.phase = SupervisorState::Idle;
        self.trigger_reconnect(Termination::Ended);
    }

    pub fn status(&self) -> SupervisorStatus {
        let connected = self.state.phase == SupervisorState::Connected;
        SupervisorStatus {
            state: self.state.phase,
            is_reconnecting: self.state.is_reconnecting,
            attempt_count: self.state.attempt_count,
            max_attempts: self.config.max_reconnect_attempts,
            generation: self.state.generation.0,
            next_retry_in: self.state.pending_timer.as_ref().map(TimerHandle::remaining),
            connected_as: self
                .state
                .active_session
                .as_ref()
                .filter(|_| connected)
                .map(|s| s.username().to_string()),
            connected_for: self
                .state
                .connected_since
                .filter(|_| connected)
                .map(|since| since.elapsed()),
        }
    }

    /// The spawned session, if any.
    pub fn current_session(&self) -> Option<Arc<F::Session>> {
        if self.state.phase == SupervisorState::Connected {
            self.state.active_session.clone()
        } else {
            None
        }
    }

    pub fn chat(&self, message: &str) -> Result<(), SupervisorError> {
        let session = self.current_session().ok_or(SupervisorError::NotConnected)?;
        session.chat(message)?;
        Ok(())
    }

    pub fn whisper(&self, to: &str, message: &str) -> Result<(), SupervisorError> {
        let session = self.current_session().ok_or(SupervisorError::NotConnected)?;
        session.whisper(to, message)?;
        Ok(())
    }

    // -- Actor loop -------------------------------------------------------

    /// Waits for the next message and handles it.
    ///
    /// Returns `false` once the actor should stop (shutdown requested or
    /// every handle dropped).
    pub async fn step(&mut self) -> bool {
        // Internal results first, so a session is stored before its own
        // spawn event is seen. Commands last.
        tokio::select! {
            biased;
            Some(msg) = self.internal_rx.recv() => {
                self.handle_internal(msg);
                true
            }
            Some(tagged) = self.lifecycle_rx.recv() => {
                self.handle_lifecycle(tagged);
                true
            }
            cmd = self.commands.recv() => match cmd {
                Some(cmd) => self.handle_command(cmd),
                None => false,
            },
        }
    }

    /// Handles one message if one is ready, without waiting.
    ///
    /// Returns `true` if a message was handled.
    pub fn try_step(&mut self) -> bool {
        if let Ok(msg) = self.internal_rx.try_recv() {
            self.handle_internal(msg);
            return true;
        }
        if let Ok(tagged) = self.lifecycle_rx.try_recv() {
            self.handle_lifecycle(tagged);
            return true;
        }
        if let Ok(cmd) = self.commands.try_recv() {
            if !self.handle_command(cmd) {
                self.shutdown();
            }
            return true;
        }
        false
    }

    /// Runs until shutdown. Quits the session on the way out.
    pub async fn run(mut self) {
        info!(address = %self.params.address(), "connection supervisor running");
        while self.step().await {}
        self.shutdown();
        info!("connection supervisor stopped");
    }

    fn shutdown(&mut self) {
        self.cancel_timer();
        self.abort_connect();
        self.retire_session();
        self.state.is_reconnecting = false;
    }

    fn handle_command(&mut self, cmd: SupervisorCommand<F::Session>) -> bool {
        match cmd {
            SupervisorCommand::ForceReconnect { reply } => {
                self.force_reconnect();
                let _ = reply.send(());
            }
            SupervisorCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SupervisorCommand::CurrentSession { reply } => {
                let _ = reply.send(self.current_session());
            }
            SupervisorCommand::Chat { message, reply } => {
                let _ = reply.send(self.chat(&message));
            }
            SupervisorCommand::Whisper { to, message, reply } => {
                let _ = reply.send(self.whisper(&to, &message));
            }
            SupervisorCommand::Shutdown => return false,
        }
        true
    }

    fn handle_internal(&mut self, msg: Internal<F::Session>) {
        match msg {
            Internal::TimerFired(id) => self.on_timer_fired(id),
            Internal::ConnectFinished { generation, result } => {
                self.on_connect_finished(generation, result)
            }
        }
    }

    // -- Lifecycle events -------------------------------------------------

    /// Applies one lifecycle event from a session.
    pub fn handle_lifecycle(&mut self, tagged: TaggedEvent) {
        let TaggedEvent { generation, event } = tagged;
        if generation != self.state.generation {
            debug!(
                %generation,
                current = %self.state.generation,
                kind = event.kind(),
                "ignoring event from retired session"
            );
            return;
        }
        if self.state.phase.is_terminal() {
            debug!(
                state = %self.state.phase,
                kind = event.kind(),
                "ignoring event in terminal state"
            );
            return;
        }

        match event {
            LifecycleEvent::Spawned => self.on_spawned(),
            LifecycleEvent::Terminated { reason } => {
                warn!(%generation, %reason, "bot disconnected");
                self.on_termination(reason, Termination::Ended);
            }
            LifecycleEvent::ErrorOccurred { message } => {
                error!(%generation, error = %message, "bot error occurred");
                if let Some(matched) = self.config.classifier.matched(&message) {
                    error!(matched, "fatal error, not attempting reconnection");
                    self.enter_fatal(message);
                } else {
                    self.on_termination(message, Termination::Ended);
                }
            }
            LifecycleEvent::Kicked { reason } => {
                warn!(%generation, %reason, "bot was kicked");
                if reason.contains("illegal_characters") {
                    warn!("kicked for illegal characters, likely a message formatting issue");
                }
                if let Some(matched) = self.config.classifier.matched(&reason) {
                    error!(matched, "kick reason is fatal, not attempting reconnection");
                    self.enter_fatal(format!("kicked: {reason}"));
                } else {
                    self.on_termination(reason, Termination::Kicked);
                }
            }
        }
    }

    fn on_spawned(&mut self) {
        if !self.state.awaiting_spawn {
            // Respawn after death, or a duplicate signal.
            debug!(generation = %self.state.generation, "spawn while already connected");
            return;
        }
        self.state.awaiting_spawn = false;
        self.state.attempt_count = 0;
        self.state.is_reconnecting = false;
        self.cancel_timer();
        self.state.phase = SupervisorState::Connected;
        self.state.connected_since = Some(Instant::now());

        let username = self
            .state
            .active_session
            .as_ref()
            .map(|s| s.username().to_string())
            .unwrap_or_else(|| self.params.username.clone());
        info!(
            generation = %self.state.generation,
            address = %self.params.address(),
            %username,
            "bot spawned"
        );
        self.sink.notify(Notification::Connected {
            username,
            address: self.params.address(),
        });
    }

    /// A session ended, was kicked, or hit a retryable error.
    fn on_termination(&mut self, reason: String, cause: Termination) {
        let failed_attempt = self.state.awaiting_spawn;
        if failed_attempt {
            // The attempt died before reaching the world: count it as a
            // failure and let the trigger run again. A factory call still
            // in flight is left to finish; its session is quit on arrival.
            self.state.awaiting_spawn = false;
            self.state.is_reconnecting = false;
        } else if self.state.is_reconnecting {
            debug!(%reason, "reconnection already in progress, ignoring signal");
            return;
        }
        self.state.connected_since = None;

        if let Some(session) = self.state.active_session.take() {
            session.quit();
        }
        if !failed_attempt {
            self.sink.notify(Notification::Disconnected { reason });
        }
        self.trigger_reconnect(cause);
    }

    // -- Reconnection -----------------------------------------------------

    /// The one place a reconnection cycle starts.
    ///
    /// Checks and sets `is_reconnecting` first, so a second trigger for the
    /// same disconnect is a no-op.
    fn trigger_reconnect(&mut self, cause: Termination) {
        if self.state.is_reconnecting {
            return;
        }
        self.state.is_reconnecting = true;
        self.state.attempt_count += 1;

        let attempt = self.state.attempt_count;
        let max_attempts = self.config.max_reconnect_attempts;
        if attempt > max_attempts {
            error!(max_attempts, "max reconnection attempts reached, stopping");
            self.state.is_reconnecting = false;
            self.state.phase = SupervisorState::Exhausted;
            self.sink.notify(Notification::Exhausted {
                attempts: max_attempts,
            });
            return;
        }

        let delay = match cause {
            Termination::Ended => self.backoff.delay(attempt),
            Termination::Kicked => self
                .backoff
                .delay_with_floor(attempt, self.config.kick_delay_floor()),
        };
        self.state.phase = SupervisorState::Reconnecting;
        info!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            kicked = cause == Termination::Kicked,
            "scheduling reconnection"
        );
        self.schedule_retry(delay);
        self.sink.notify(Notification::ReconnectScheduled {
            attempt,
            max_attempts,
            delay,
        });
    }

    fn schedule_retry(&mut self, delay: Duration) {
        self.cancel_timer();
        self.next_timer_id += 1;
        let id = TimerId(self.next_timer_id);
        let deadline = Instant::now() + delay;
        let tx = self.internal_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(Internal::TimerFired(id));
        });
        self.state.pending_timer = Some(TimerHandle { id, deadline, task });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.state.pending_timer.take() {
            debug!(timer = timer.id().0, "cancelled pending retry");
            timer.cancel();
        }
    }

    fn on_timer_fired(&mut self, id: TimerId) {
        match &self.state.pending_timer {
            Some(timer) if timer.id() == id => {}
            _ => {
                debug!(timer = id.0, "ignoring cancelled timer");
                return;
            }
        }
        self.state.pending_timer = None;
        info!(
            attempt = self.state.attempt_count,
            "attempting to reconnect to the game server"
        );
        self.begin_attempt();
    }

    /// Starts a factory call for a fresh generation.
    fn begin_attempt(&mut self) {
        let lifecycle = self.attach_lifecycle_handlers();
        let generation = lifecycle.generation();
        let context = SessionContext {
            lifecycle,
            game_events: self.game_events.clone(),
        };
        self.state.awaiting_spawn = true;

        info!(%generation, address = %self.params.address(), "connecting to game server");
        let factory = Arc::clone(&self.factory);
        let params = self.params.clone();
        let tx = self.internal_tx.clone();
        self.state.connect_task = Some(tokio::spawn(async move {
            let result = factory.create_session(&params, context).await;
            let _ = tx.send(Internal::ConnectFinished { generation, result });
        }));
    }

    fn on_connect_finished(
        &mut self,
        generation: SessionGeneration,
        result: Result<F::Session, SessionError>,
    ) {
        if generation != self.state.generation {
            if let Ok(session) = result {
                debug!(%generation, "quitting session from a retired attempt");
                session.quit();
            }
            return;
        }
        self.state.connect_task = None;

        match result {
            Ok(session) => {
                let still_wanted = self.state.awaiting_spawn
                    || self.state.phase == SupervisorState::Connected;
                if !still_wanted {
                    debug!(%generation, "attempt was already written off, quitting session");
                    session.quit();
                    return;
                }
                debug!(%generation, "session created");
                self.state.active_session = Some(Arc::new(session));
            }
            Err(err) => {
                if !self.state.awaiting_spawn {
                    return;
                }
                self.state.awaiting_spawn = false;
                error!(%generation, error = %err, "reconnection attempt failed");

                let message = err.to_string();
                if self.config.classifier.is_fatal(&message) {
                    error!("fatal error, not attempting reconnection");
                    self.enter_fatal(message);
                    return;
                }
                self.state.is_reconnecting = false;
                self.trigger_reconnect(Termination::Ended);
            }
        }
    }

    // -- Teardown helpers -------------------------------------------------

    fn enter_fatal(&mut self, reason: String) {
        self.cancel_timer();
        self.abort_connect();
        self.retire_session();
        self.state.is_reconnecting = false;
        self.state.phase = SupervisorState::Fatal;
        error!(%reason, "connection supervisor stopped retrying");
        self.sink.notify(Notification::Fatal { reason });
    }

    fn abort_connect(&mut self) {
        self.state.awaiting_spawn = false;
        if let Some(task) = self.state.connect_task.take() {
            task.abort();
        }
    }

    /// Quits the active session and invalidates its lifecycle sender.
    fn retire_session(&mut self) {
        if let Some(session) = self.state.active_session.take() {
            session.quit();
        }
        self.state.connected_since = None;
        self.state.generation = self.state.generation.next();
    }
}

/// Spawns a supervisor on the Tokio runtime and starts the first connect.
///
/// Returns the handle and the actor's join handle. The actor stops when
/// [`SupervisorHandle::shutdown`] is called or every handle is dropped.
pub fn spawn_supervisor<F: SessionFactory>(
    factory: Arc<F>,
    params: ConnectParams,
    config: SupervisorConfig,
    sink: Arc<dyn NotificationSink>,
    game_events: GameEventSender,
) -> (SupervisorHandle<F::Session>, JoinHandle<()>) {
    let (mut supervisor, handle) =
        ConnectionSupervisor::new(factory, params, config, sink, game_events);
    supervisor.start();
    let task = tokio::spawn(supervisor.run());
    (handle, task)
}
