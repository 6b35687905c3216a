//! Relay configuration.
//!
//! Settings come from three places, later ones winning:
//!
//! 1. an optional JSON settings file
//! 2. a `.env` file in the working directory (loaded into the environment)
//! 3. environment variables such as `MINECRAFT_HOST` or `RECONNECT_DELAY`
//!
//! Every field has a default, so an empty file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mcrelay_bridge::BridgeConfig;
use mcrelay_session::{AuthMode, ConnectParams};
use mcrelay_supervisor::{FatalErrorClassifier, SupervisorConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Problems loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override that doesn't parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// A value that parses but makes no sense.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The game server and bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinecraftConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMode,
    pub version: Option<String>,
}

impl Default for MinecraftConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25565,
            username: "RelayBot".to_string(),
            auth: AuthMode::Offline,
            version: None,
        }
    }
}

/// The Discord side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: Option<String>,
    pub channel_id: Option<String>,
    pub command_prefix: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_id: None,
            command_prefix: "!".to_string(),
        }
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
    pub kick_multiplier: u32,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Substrings that mark an error as not worth retrying.
    pub fatal_matchers: FatalErrorClassifier,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5_000,
            max_attempts: 10,
            kick_multiplier: 3,
            max_delay_ms: 60_000,
            jitter_ms: 1_000,
            fatal_matchers: FatalErrorClassifier::default(),
        }
    }
}

/// AI reply behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub chat_cooldown_ms: u64,
    pub trigger_words: Vec<String>,
    pub chunk_len: usize,
    pub follow_up_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chat_cooldown_ms: 2_000,
            trigger_words: vec!["bot".to_string(), "ai".to_string()],
            chunk_len: mcrelay_bridge::format::DEFAULT_CHUNK_LEN,
            follow_up_delay_ms: 2_000,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Everything the relay can be configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub minecraft: MinecraftConfig,
    pub discord: DiscordConfig,
    pub reconnect: ReconnectConfig,
    pub ai: AiConfig,
    pub log_level: String,
    pub debug_mode: bool,
    /// Write logs here (appending) instead of stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            minecraft: MinecraftConfig::default(),
            discord: DiscordConfig::default(),
            reconnect: ReconnectConfig::default(),
            ai: AiConfig::default(),
            log_level: "info".to_string(),
            debug_mode: false,
            log_file: None,
        }
    }
}

impl RelayConfig {
    /// Loads the settings file (if given and present), then `.env`, then
    /// environment overrides, and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                debug!(path = %path.display(), "settings file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        if let Ok(env_path) = dotenv::dotenv() {
            debug!(path = %env_path.display(), "loaded .env");
        }
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON settings file. No overrides, no validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    ///
    /// Unset and empty variables are skipped.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MINECRAFT_HOST") {
            self.minecraft.host = v;
        }
        if let Some(v) = get("MINECRAFT_PORT") {
            self.minecraft.port = parse("MINECRAFT_PORT", &v)?;
        }
        if let Some(v) = get("MINECRAFT_USERNAME") {
            self.minecraft.username = v;
        }
        if let Some(v) = get("DISCORD_TOKEN") {
            self.discord.token = Some(v);
        }
        if let Some(v) = get("DISCORD_CHANNEL_ID") {
            self.discord.channel_id = Some(v);
        }
        if let Some(v) = get("COMMAND_PREFIX") {
            self.discord.command_prefix = v;
        }
        if let Some(v) = get("RECONNECT_DELAY") {
            self.reconnect.base_delay_ms = parse("RECONNECT_DELAY", &v)?;
        }
        if let Some(v) = get("MAX_RECONNECT_ATTEMPTS") {
            self.reconnect.max_attempts = parse("MAX_RECONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("CHAT_COOLDOWN") {
            self.ai.chat_cooldown_ms = parse("CHAT_COOLDOWN", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = get("DEBUG_MODE") {
            self.debug_mode = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = get("LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Rejects settings the relay can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minecraft.host.trim().is_empty() {
            return Err(ConfigError::Invalid("minecraft host is empty".into()));
        }
        if self.minecraft.port == 0 {
            return Err(ConfigError::Invalid("minecraft port must not be 0".into()));
        }
        if self.minecraft.username.trim().is_empty() {
            return Err(ConfigError::Invalid("minecraft username is empty".into()));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconnect base delay must be at least 1 ms".into(),
            ));
        }
        Ok(())
    }

    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.minecraft.host.clone(),
            port: self.minecraft.port,
            username: self.minecraft.username.clone(),
            auth: self.minecraft.auth,
            version: self.minecraft.version.clone(),
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            base_reconnect_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.reconnect.max_delay_ms),
            max_jitter: Duration::from_millis(self.reconnect.jitter_ms),
            max_reconnect_attempts: self.reconnect.max_attempts,
            kick_delay_multiplier: self.reconnect.kick_multiplier,
            classifier: self.reconnect.fatal_matchers.clone(),
            ..SupervisorConfig::default()
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            bot_username: self.minecraft.username.clone(),
            command_prefix: self.discord.command_prefix.clone(),
            ai_enabled: self.ai.enabled,
            chat_cooldown: Duration::from_millis(self.ai.chat_cooldown_ms),
            trigger_words: self.ai.trigger_words.clone(),
            chunk_len: self.ai.chunk_len,
            follow_up_delay: Duration::from_millis(self.ai.follow_up_delay_ms),
        }
    }

    /// The filter used when `RUST_LOG` is not set.
    pub fn log_directive(&self) -> &str {
        if self.debug_mode {
            "debug"
        } else if self.log_level.trim().is_empty() {
            "info"
        } else {
            self.log_level.trim()
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_relay_config_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.minecraft.port, 25565);
        assert_eq!(config.reconnect.base_delay_ms, 5_000);
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.kick_multiplier, 3);
        assert_eq!(config.ai.chat_cooldown_ms, 2_000);
        assert_eq!(config.discord.command_prefix, "!");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_file_keeps_defaults() {
        let config = RelayConfig::from_json(
            r#"{ "minecraft": { "host": "play.example.net" }, "reconnect": { "max_attempts": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.minecraft.host, "play.example.net");
        assert_eq!(config.minecraft.port, 25565);
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.base_delay_ms, 5_000);
    }

    #[test]
    fn test_from_json_fatal_matchers_list() {
        let config = RelayConfig::from_json(
            r#"{ "reconnect": { "fatal_matchers": ["Banned", "maintenance"] } }"#,
        )
        .unwrap();
        assert!(config.reconnect.fatal_matchers.is_fatal("server under MAINTENANCE"));
        assert!(!config.reconnect.fatal_matchers.is_fatal("whitelist"));
    }

    #[test]
    fn test_from_json_malformed_is_parse_error() {
        let err = RelayConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_apply_overrides_sets_fields() {
        let mut config = RelayConfig::default();
        config
            .apply_overrides(env(&[
                ("MINECRAFT_HOST", "mc.example.org"),
                ("MINECRAFT_PORT", "48688"),
                ("RECONNECT_DELAY", "2500"),
                ("MAX_RECONNECT_ATTEMPTS", "4"),
                ("CHAT_COOLDOWN", "500"),
                ("DEBUG_MODE", "true"),
                ("DISCORD_TOKEN", "secret"),
            ]))
            .unwrap();

        assert_eq!(config.minecraft.host, "mc.example.org");
        assert_eq!(config.minecraft.port, 48688);
        assert_eq!(config.reconnect.base_delay_ms, 2_500);
        assert_eq!(config.reconnect.max_attempts, 4);
        assert_eq!(config.ai.chat_cooldown_ms, 500);
        assert!(config.debug_mode);
        assert_eq!(config.discord.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_apply_overrides_bad_number_is_invalid_value() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_overrides(env(&[("MINECRAFT_PORT", "twenty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, ref value } if key == "MINECRAFT_PORT" && value == "twenty"
        ));
    }

    #[test]
    fn test_apply_overrides_empty_values_are_skipped() {
        let mut config = RelayConfig::default();
        config
            .apply_overrides(env(&[("MINECRAFT_HOST", "  "), ("MINECRAFT_PORT", "")]))
            .unwrap();
        assert_eq!(config.minecraft.host, "localhost");
        assert_eq!(config.minecraft.port, 25565);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.minecraft.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RelayConfig::default();
        config.minecraft.host = String::new();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.reconnect.base_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_directive() {
        let mut config = RelayConfig::default();
        assert_eq!(config.log_directive(), "info");
        config.log_level = "warn,mcrelay_supervisor=debug".into();
        assert_eq!(config.log_directive(), "warn,mcrelay_supervisor=debug");
        config.debug_mode = true;
        assert_eq!(config.log_directive(), "debug");
    }

    #[test]
    fn test_supervisor_config_conversion() {
        let mut config = RelayConfig::default();
        config.reconnect.base_delay_ms = 1_000;
        config.reconnect.kick_multiplier = 5;
        let sup = config.supervisor_config();
        assert_eq!(sup.base_reconnect_delay, Duration::from_secs(1));
        assert_eq!(sup.kick_delay_floor(), Duration::from_secs(5));
        assert_eq!(sup.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_bridge_config_uses_bot_username() {
        let mut config = RelayConfig::default();
        config.minecraft.username = "AIBot".into();
        assert_eq!(config.bridge_config().bot_username, "AIBot");
    }
}
