//! End-to-end tests for the relay with mock game, Discord and AI sides.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcrelay::prelude::*;

// =========================================================================
// Mocks
// =========================================================================

#[derive(Default)]
struct World {
    chat: Mutex<Vec<String>>,
    contexts: Mutex<Vec<SessionContext>>,
}

impl World {
    fn chat(&self) -> Vec<String> {
        self.chat.lock().unwrap().clone()
    }

    fn context(&self) -> SessionContext {
        self.contexts.lock().unwrap()[0].clone()
    }
}

struct Bot {
    world: Arc<World>,
}

impl GameSession for Bot {
    fn username(&self) -> &str {
        "RelayBot"
    }

    fn chat(&self, message: &str) -> Result<(), SessionError> {
        self.world.chat.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn quit(&self) {}
}

/// Spawns right away when `online`, otherwise never does.
struct BotFactory {
    world: Arc<World>,
    online: bool,
}

impl SessionFactory for BotFactory {
    type Session = Bot;

    async fn create_session(
        &self,
        _params: &ConnectParams,
        context: SessionContext,
    ) -> Result<Bot, SessionError> {
        if self.online {
            context.lifecycle.spawned();
        }
        self.world.contexts.lock().unwrap().push(context);
        Ok(Bot {
            world: Arc::clone(&self.world),
        })
    }
}

#[derive(Default)]
struct Channel {
    posts: Mutex<Vec<String>>,
}

impl Channel {
    fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

impl ChatChannel for Channel {
    async fn send(&self, text: &str) -> Result<(), BridgeError> {
        self.posts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Answers every request, after thinking for a while.
struct SlowAi {
    thinking: Duration,
}

impl ResponseGenerator for SlowAi {
    async fn generate(&self, request: &AiRequest) -> Option<String> {
        tokio::time::sleep(self.thinking).await;
        Some(format!("hi {}", request.username))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type TestRelay<G = NoResponses> = Relay<BotFactory, Channel, G>;

fn build(config: RelayConfig) -> (TestRelay, Arc<World>, Arc<Channel>) {
    build_with(config, true, Arc::new(NoResponses))
}

fn build_with<G: ResponseGenerator>(
    config: RelayConfig,
    online: bool,
    generator: Arc<G>,
) -> (TestRelay<G>, Arc<World>, Arc<Channel>) {
    let world = Arc::new(World::default());
    let channel = Arc::new(Channel::default());
    let relay = Relay::builder()
        .config(config)
        .build(
            BotFactory {
                world: Arc::clone(&world),
                online,
            },
            Arc::clone(&channel),
            generator,
        )
        .unwrap();
    (relay, world, channel)
}

async fn settle_until(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

async fn connected<G: ResponseGenerator>(relay: &TestRelay<G>, channel: &Channel) {
    settle_until(|| !channel.posts().is_empty()).await;
    let status = relay.handle().status().await.unwrap();
    assert_eq!(status.state, SupervisorState::Connected);
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_build_rejects_invalid_config() {
    let mut config = RelayConfig::default();
    config.minecraft.port = 0;

    let result = Relay::builder().config(config).build(
        BotFactory {
            world: Arc::new(World::default()),
            online: true,
        },
        Arc::new(Channel::default()),
        Arc::new(NoResponses),
    );

    assert!(matches!(result, Err(RelayError::Config(ConfigError::Invalid(_)))));
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_announced_in_channel() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    assert_eq!(channel.posts(), vec!["🟢 **[MC]** Bot connected as RelayBot"]);
}

#[tokio::test(start_paused = true)]
async fn test_discord_chat_reaches_game() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "evening all"))
        .await
        .unwrap();

    assert_eq!(world.chat(), vec!["[D] kim: evening all"]);
}

#[tokio::test(start_paused = true)]
async fn test_discord_too_long_is_answered_in_channel() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "y".repeat(300)))
        .await
        .unwrap();

    assert!(world.chat().is_empty());
    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some("❌ Message too long for Minecraft chat (max 256 characters)")
    );
}

#[tokio::test(start_paused = true)]
async fn test_status_command_replies_in_channel() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcstatus"))
        .await
        .unwrap();

    let reply = channel.posts().last().cloned().unwrap();
    assert!(reply.contains("Connected as RelayBot"), "got {reply:?}");
}

#[tokio::test(start_paused = true)]
async fn test_mcchat_command_sends_text() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcchat hello world"))
        .await
        .unwrap();

    assert_eq!(world.chat(), vec!["hello world"]);
    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some("✅ Sent to Minecraft chat: hello world")
    );
}

#[tokio::test(start_paused = true)]
async fn test_mcreconnect_command_resets_and_retries() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcreconnect"))
        .await
        .unwrap();

    let status = relay.handle().status().await.unwrap();
    assert_eq!(status.state, SupervisorState::Reconnecting);
    assert_eq!(status.attempt_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_gets_reply() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcdance"))
        .await
        .unwrap();

    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some("❓ Unknown command: mcdance")
    );
}

#[tokio::test(start_paused = true)]
async fn test_mccommand_adds_slash() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mccommand time set day"))
        .await
        .unwrap();

    assert_eq!(world.chat(), vec!["/time set day"]);
    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some("✅ Sent command: /time set day")
    );
}

#[tokio::test(start_paused = true)]
async fn test_mcuptime_reports_time_since_spawn() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    tokio::time::advance(Duration::from_secs(125)).await;
    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcuptime"))
        .await
        .unwrap();

    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some("⏱️ Connected for 2m 5s")
    );
}

#[tokio::test(start_paused = true)]
async fn test_mcping_and_mchelp_reply() {
    let (relay, _world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcping"))
        .await
        .unwrap();
    let ping = channel.posts().last().cloned().unwrap();
    assert!(ping.starts_with("🏓 Relay round trip:"), "got {ping:?}");
    assert!(ping.ends_with("✅ Connected"), "got {ping:?}");

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mchelp"))
        .await
        .unwrap();
    assert_eq!(
        channel.posts().last().map(String::as_str),
        Some(mcrelay::commands::HELP)
    );
}

#[tokio::test(start_paused = true)]
async fn test_offline_mention_gets_warning() {
    let (relay, world, channel) = build_with(RelayConfig::default(), false, Arc::new(NoResponses));
    settle_until(|| !world.contexts.lock().unwrap().is_empty()).await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "is the bot up?"))
        .await
        .unwrap();
    relay
        .on_discord_message(&DiscordMessage::new("kim", "good morning"))
        .await
        .unwrap();

    assert!(world.chat().is_empty());
    assert_eq!(channel.posts(), vec!["⚠️ Minecraft bot is currently offline"]);
}

#[tokio::test(start_paused = true)]
async fn test_running_relay_answers_discord_side() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;
    let relay = Arc::new(relay);
    let runner = tokio::spawn({
        let relay = Arc::clone(&relay);
        async move { relay.run().await }
    });
    tokio::task::yield_now().await;

    relay
        .on_discord_message(&DiscordMessage::new("kim", "!mcchat\thello"))
        .await
        .unwrap();
    relay
        .on_discord_message(&DiscordMessage::new("kim", "z".repeat(300)))
        .await
        .unwrap();

    assert_eq!(world.chat(), vec!["hello"]);
    assert_eq!(
        channel.posts()[1..],
        [
            "✅ Sent to Minecraft chat: hello",
            "❌ Message too long for Minecraft chat (max 256 characters)",
        ]
    );
    assert!(matches!(relay.run().await, Err(RelayError::AlreadyRunning)));

    relay.shutdown().await;
    runner.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_ai_reply_does_not_stall_event_loop() {
    let ai = Arc::new(SlowAi {
        thinking: Duration::from_secs(10),
    });
    let (relay, world, channel) = build_with(RelayConfig::default(), true, ai);
    connected(&relay, &channel).await;
    let relay = Arc::new(relay);
    let runner = tokio::spawn({
        let relay = Arc::clone(&relay);
        async move { relay.run().await }
    });

    let events = world.context().game_events;
    events
        .send(GameEvent::Chat {
            username: "Steve".into(),
            message: "hey bot".into(),
        })
        .unwrap();
    events
        .send(GameEvent::PlayerJoined {
            username: "Alex".into(),
        })
        .unwrap();
    settle_until(|| channel.posts().len() == 3).await;
    assert_eq!(
        channel.posts()[1..],
        ["**[MC]** Steve: hey bot", "**[MC]** ➕ Alex joined the server"]
    );
    assert!(world.chat().is_empty());

    tokio::time::advance(Duration::from_secs(10)).await;
    settle_until(|| !world.chat().is_empty()).await;
    assert_eq!(world.chat(), vec!["✦ AI: hi Steve"]);

    relay.shutdown().await;
    runner.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_relays_game_events_until_shutdown() {
    let (relay, world, channel) = build(RelayConfig::default());
    connected(&relay, &channel).await;
    let relay = Arc::new(relay);
    let handle = relay.handle().clone();
    let task = tokio::spawn({
        let relay = Arc::clone(&relay);
        async move { relay.run().await }
    });

    world
        .context()
        .game_events
        .send(GameEvent::PlayerJoined {
            username: "Alex".into(),
        })
        .unwrap();
    settle_until(|| channel.posts().len() == 2).await;
    assert_eq!(channel.posts()[1], "**[MC]** ➕ Alex joined the server");

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
    assert!(handle.is_closed());
}
