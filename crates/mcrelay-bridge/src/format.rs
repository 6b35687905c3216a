//! Text shaping for both directions of the bridge.
//!
//! Discord lines are tagged `**[MC]**` so people can tell relayed chat from
//! native messages; game lines are tagged `[D]`. AI replies are cleaned
//! and cut into pieces that fit comfortably in a game chat message.

use mcrelay_supervisor::Notification;

/// Longest line the game accepts in one chat message.
pub const MAX_GAME_CHAT_LEN: usize = 256;

/// Default length of one AI reply chunk.
pub const DEFAULT_CHUNK_LEN: usize = 75;

/// Prefix for the first chunk of an AI reply.
pub const AI_PREFIX: &str = "✦ AI: ";

/// Prefix for follow-up chunks.
pub const FOLLOW_UP_PREFIX: &str = "» ";

// ---------------------------------------------------------------------------
// Game → Discord
// ---------------------------------------------------------------------------

pub fn game_chat_line(username: &str, message: &str) -> String {
    format!("**[MC]** {username}: {message}")
}

pub fn player_joined_line(username: &str) -> String {
    format!("**[MC]** ➕ {username} joined the server")
}

pub fn player_left_line(username: &str) -> String {
    format!("**[MC]** ➖ {username} left the server")
}

pub fn death_line(death_count: u32) -> String {
    format!("**[MC]** 💀 Bot died (death #{death_count})")
}

/// The Discord line for a supervisor notification.
pub fn notification_line(notification: &Notification) -> String {
    match notification {
        Notification::Connected { username, .. } => {
            format!("🟢 **[MC]** Bot connected as {username}")
        }
        Notification::Disconnected { reason } => {
            format!("🔴 **[MC]** Bot disconnected: {reason}")
        }
        Notification::ReconnectScheduled { .. } => format!("🔄 **[MC]** {notification}"),
        Notification::Exhausted { .. } | Notification::Fatal { .. } => {
            format!("⛔ **[MC]** {notification}")
        }
    }
}

// ---------------------------------------------------------------------------
// Discord → game
// ---------------------------------------------------------------------------

pub fn discord_chat_line(author: &str, content: &str) -> String {
    format!("[D] {author}: {content}")
}

// ---------------------------------------------------------------------------
// AI replies
// ---------------------------------------------------------------------------

/// Strips `<think>…</think>` reasoning blocks and surrounding whitespace.
///
/// An unterminated `<think>` swallows the rest of the text.
pub fn clean_response(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Word-wraps `text` into chunks of at most `chunk_len` characters.
///
/// Words longer than a whole chunk are cut. Whitespace runs collapse to a
/// single space. Empty input gives no chunks.
pub fn split_reply(text: &str, chunk_len: usize) -> Vec<String> {
    let chunk_len = chunk_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > chunk_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let tail = word.split_off(chunk_len);
            chunks.push(word.into_iter().collect());
            word = tail;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current_len + 1 + word.len()
        };
        if needed > chunk_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cleans and splits a reply, then prefixes each chunk for sending.
pub fn reply_lines(raw: &str, chunk_len: usize) -> Vec<String> {
    split_reply(&clean_response(raw), chunk_len)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let prefix = if i == 0 { AI_PREFIX } else { FOLLOW_UP_PREFIX };
            format!("{prefix}{chunk}")
        })
        .collect()
}
