use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcrelay::prelude::*;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};

// ---------------------------------------------------------------------------
// Simulated Minecraft server
// ---------------------------------------------------------------------------

const PLAYERS: [&str; 3] = ["Steve", "Alex", "Notch"];

/// A session that prints what the bot says and stops its event feed on quit.
struct SimSession {
    username: String,
    alive: Arc<AtomicBool>,
}

impl GameSession for SimSession {
    fn username(&self) -> &str {
        &self.username
    }

    fn chat(&self, message: &str) -> Result<(), SessionError> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(SessionError::NotAlive);
        }
        println!("[game] <{}> {message}", self.username);
        Ok(())
    }

    fn quit(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Connects after a short delay, fails now and then, and drops live
/// sessions at random so the supervisor has something to do.
struct FlakyServer {
    failure_rate: f64,
}

impl SessionFactory for FlakyServer {
    type Session = SimSession;

    async fn create_session(
        &self,
        params: &ConnectParams,
        context: SessionContext,
    ) -> Result<SimSession, SessionError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let refused = rand::rng().random_bool(self.failure_rate);
        if refused {
            return Err(SessionError::ConnectFailed(format!(
                "{} refused the connection",
                params.address()
            )));
        }

        let alive = Arc::new(AtomicBool::new(true));
        tokio::spawn(simulate(context, Arc::clone(&alive)));
        Ok(SimSession {
            username: params.username.clone(),
            alive,
        })
    }
}

enum Tick {
    Event(GameEvent),
    Kick,
    Drop,
}

fn next_tick() -> Tick {
    let mut rng = rand::rng();
    let player = PLAYERS[rng.random_range(0..PLAYERS.len())].to_string();
    match rng.random_range(0..20) {
        0 => Tick::Kick,
        1 => Tick::Drop,
        2 => Tick::Event(GameEvent::Death),
        3 => Tick::Event(GameEvent::PlayerJoined { username: player }),
        4 => Tick::Event(GameEvent::PlayerLeft { username: player }),
        5 => Tick::Event(GameEvent::Whisper {
            username: player,
            message: "are you a bot?".into(),
        }),
        6 => Tick::Event(GameEvent::Chat {
            username: player,
            message: "hey bot, what time is it?".into(),
        }),
        _ => Tick::Event(GameEvent::Chat {
            username: player,
            message: "anyone seen my diamonds".into(),
        }),
    }
}

async fn simulate(context: SessionContext, alive: Arc<AtomicBool>) {
    context.lifecycle.spawned();
    let mut ticks = tokio::time::interval(Duration::from_secs(3));
    ticks.tick().await;

    while alive.load(Ordering::Acquire) {
        ticks.tick().await;
        if !alive.load(Ordering::Acquire) {
            break;
        }
        match next_tick() {
            Tick::Event(event) => {
                let _ = context.game_events.send(event);
            }
            Tick::Kick => {
                context.lifecycle.kicked("You are sending messages too quickly");
                context.lifecycle.terminated("kicked");
                break;
            }
            Tick::Drop => {
                context.lifecycle.terminated("socketClosed");
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
}

// ---------------------------------------------------------------------------
// Console stand-ins for Discord and the AI
// ---------------------------------------------------------------------------

struct Console;

impl ChatChannel for Console {
    async fn send(&self, text: &str) -> Result<(), BridgeError> {
        println!("[discord] {text}");
        Ok(())
    }
}

struct Echo;

impl ResponseGenerator for Echo {
    async fn generate(&self, request: &AiRequest) -> Option<String> {
        Some(format!("{}, you said: {}", request.username, request.message))
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RelayConfig::load(Some(Path::new("settings.json")))?;
    config.reconnect.base_delay_ms = config.reconnect.base_delay_ms.min(2_000);
    mcrelay::logging::init(&config)?;
    eprintln!("type a line to send it from \"console\"; !mchelp lists the commands");

    let relay = Arc::new(Relay::builder().config(config).build(
        FlakyServer { failure_rate: 0.3 },
        Arc::new(Console),
        Arc::new(Echo),
    )?);

    let console = Arc::clone(&relay);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let message = DiscordMessage::new("console", line);
            if let Err(e) = console.on_discord_message(&message).await {
                tracing::warn!(error = %e, "console message not handled");
            }
        }
    });

    relay.run().await?;
    Ok(())
}
