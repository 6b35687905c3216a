//! Admin commands that act on the connection.
//!
//! The Discord integration parses `!mcstatus`, `!mcchat <text>` and the
//! rest of [`HELP`] (or their slash-command forms) and hands the bare name
//! and argument string to [`dispatch`]. The returned text is the reply to
//! post back.

use std::fmt::Write as _;
use std::time::Duration;

use mcrelay_bridge::format::MAX_GAME_CHAT_LEN;
use mcrelay_session::GameSession;
use mcrelay_supervisor::{SupervisorError, SupervisorHandle, SupervisorState, SupervisorStatus};
use tokio::time::Instant;
use tracing::info;

use crate::RelayError;

/// Reply to `mchelp`.
pub const HELP: &str = "**Minecraft relay commands**
`mcstatus` - connection state and reconnect attempts
`mcuptime` - how long the bot has been connected
`mcping` - relay round trip and connection state
`mcchat <message>` - say something in game chat
`mccommand <command>` - run a server command as the bot
`mcreconnect` - reconnect now, resetting the attempt counter
`mchelp` - this list";

/// Runs one admin command and returns the reply text.
///
/// # Errors
/// Only [`SupervisorError::Unavailable`] (wrapped in [`RelayError`]) is an
/// error; everything else, including "not connected", is a reply.
pub async fn dispatch<S: GameSession>(
    handle: &SupervisorHandle<S>,
    command: &str,
    args: &str,
) -> Result<String, RelayError> {
    let command = command.trim().trim_start_matches('/').to_lowercase();
    let args = args.trim();

    match command.as_str() {
        "mcstatus" => {
            let status = handle.status().await?;
            Ok(render_status(&status))
        }
        "mcreconnect" => {
            info!("manual reconnect requested from chat");
            handle.force_reconnect().await?;
            Ok("🔄 Reconnecting to the Minecraft server (attempt counter reset).".to_string())
        }
        "mcchat" => {
            if args.is_empty() {
                return Ok("Usage: mcchat <message>".to_string());
            }
            send_line(handle, args, format!("✅ Sent to Minecraft chat: {args}")).await
        }
        "mccommand" => {
            if args.is_empty() {
                return Ok("Usage: mccommand <command>".to_string());
            }
            let line = if args.starts_with('/') {
                args.to_string()
            } else {
                format!("/{args}")
            };
            info!(command = %line, "server command requested from chat");
            let ack = format!("✅ Sent command: {line}");
            send_line(handle, &line, ack).await
        }
        "mcuptime" => {
            let status = handle.status().await?;
            Ok(match status.connected_for {
                Some(up) => format!("⏱️ Connected for {}", format_uptime(up)),
                None => format!("⏱️ Not connected ({})", status.state),
            })
        }
        "mcping" => {
            let start = Instant::now();
            let status = handle.status().await?;
            let round_trip = start.elapsed();
            let link = if status.state == SupervisorState::Connected {
                "✅ Connected"
            } else {
                "❌ Disconnected"
            };
            Ok(format!(
                "🏓 Relay round trip: {}ms | {link}",
                round_trip.as_millis()
            ))
        }
        "mchelp" => Ok(HELP.to_string()),
        other => Ok(format!("❓ Unknown command: {other}")),
    }
}

/// Sends one line into game chat and turns the usual failures into replies.
async fn send_line<S: GameSession>(
    handle: &SupervisorHandle<S>,
    line: &str,
    ack: String,
) -> Result<String, RelayError> {
    if line.chars().count() > MAX_GAME_CHAT_LEN {
        return Ok(format!(
            "❌ Message too long for Minecraft chat (max {MAX_GAME_CHAT_LEN} characters)"
        ));
    }
    match handle.chat(line).await {
        Ok(()) => Ok(ack),
        Err(SupervisorError::NotConnected) => {
            Ok("❌ Bot is not connected to Minecraft server".to_string())
        }
        Err(SupervisorError::Session(e)) => Ok(format!("❌ Failed to send: {e}")),
        Err(e) => Err(e.into()),
    }
}

/// `1d 2h 3m 4s`, leading zero units dropped.
pub fn format_uptime(up: Duration) -> String {
    let secs = up.as_secs();
    let (days, hours, minutes, seconds) =
        (secs / 86_400, secs % 86_400 / 3_600, secs % 3_600 / 60, secs % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Human-readable status block.
pub fn render_status(status: &SupervisorStatus) -> String {
    let mut out = String::from("**Minecraft relay status**\n");
    let state = match (&status.state, &status.connected_as) {
        (SupervisorState::Connected, Some(name)) => format!("🟢 Connected as {name}"),
        (SupervisorState::Connected, None) => "🟢 Connected".to_string(),
        (SupervisorState::Idle, _) => "⚪ Connecting".to_string(),
        (SupervisorState::Reconnecting, _) => "🟡 Reconnecting".to_string(),
        (SupervisorState::Exhausted, _) => "⛔ Gave up (use mcreconnect)".to_string(),
        (SupervisorState::Fatal, _) => "⛔ Stopped on a fatal error (use mcreconnect)".to_string(),
    };
    let _ = writeln!(out, "State: {state}");
    let _ = writeln!(
        out,
        "Reconnect attempts: {}/{}",
        status.attempt_count, status.max_attempts
    );
    if let Some(up) = status.connected_for {
        let _ = writeln!(out, "Uptime: {}", format_uptime(up));
    }
    if let Some(wait) = status.next_retry_in {
        let _ = writeln!(out, "Next retry in: {:.1}s", wait.as_secs_f64());
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status(state: SupervisorState) -> SupervisorStatus {
        SupervisorStatus {
            state,
            is_reconnecting: false,
            attempt_count: 0,
            max_attempts: 10,
            generation: 1,
            next_retry_in: None,
            connected_as: None,
            connected_for: None,
        }
    }

    #[test]
    fn test_render_status_connected() {
        let text = render_status(&SupervisorStatus {
            connected_as: Some("RelayBot".into()),
            ..status(SupervisorState::Connected)
        });
        assert!(text.contains("Connected as RelayBot"));
        assert!(text.contains("Reconnect attempts: 0/10"));
        assert!(!text.contains("Next retry"));
    }

    #[test]
    fn test_render_status_reconnecting_shows_retry() {
        let text = render_status(&SupervisorStatus {
            attempt_count: 2,
            is_reconnecting: true,
            next_retry_in: Some(Duration::from_millis(9_500)),
            ..status(SupervisorState::Reconnecting)
        });
        assert!(text.contains("Reconnecting"));
        assert!(text.contains("Reconnect attempts: 2/10"));
        assert!(text.ends_with("Next retry in: 9.5s"));
    }

    #[test]
    fn test_render_status_connected_shows_uptime() {
        let text = render_status(&SupervisorStatus {
            connected_as: Some("RelayBot".into()),
            connected_for: Some(Duration::from_secs(3_725)),
            ..status(SupervisorState::Connected)
        });
        assert!(text.contains("Uptime: 1h 2m 5s"));
    }

    #[test]
    fn test_format_uptime_drops_leading_zero_units() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(61)), "1m 1s");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1h 1m 1s");
    }

    #[test]
    fn test_help_lists_every_command() {
        for name in [
            "mcstatus",
            "mcuptime",
            "mcping",
            "mcchat",
            "mccommand",
            "mcreconnect",
            "mchelp",
        ] {
            assert!(HELP.contains(name), "{name} missing from help");
        }
    }

    #[test]
    fn test_render_status_terminal_mentions_reconnect_command() {
        assert!(render_status(&status(SupervisorState::Exhausted)).contains("mcreconnect"));
        assert!(render_status(&status(SupervisorState::Fatal)).contains("mcreconnect"));
    }
}
