use std::fmt::Write as _;

use chorus_store::UserSummary;
use chorus_suno::Credits;

/// A bot command recognized in an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Generate,
    Stop,
    ReloadUsers,
    Credits,
    /// Prefixed text naming no known command
    Unknown(String),
}

impl Command {
    /// Parse `text` as a command, `None` when it is ordinary conversation
    ///
    /// Command names are case-insensitive and may carry a `@botname` suffix
    /// as group chats append it; arguments after the name are ignored.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(prefix)?;
        let word = rest.split_whitespace().next()?;
        let name = word.split_once('@').map_or(word, |(name, _)| name).to_lowercase();

        Some(match name.as_str() {
            "help" | "start" => Self::Help,
            "generate" => Self::Generate,
            "stop" => Self::Stop,
            "reload_users" => Self::ReloadUsers,
            "credits" => Self::Credits,
            _ => Self::Unknown(name),
        })
    }
}

/// Text of the `help` command
pub fn help_text(prefix: &str) -> String {
    format!(
        "👋 Hello! Welcome to the Suno AI Music Generator Bot! 🎶\n\n\
         👉 Use {prefix}help to show this basic help information 🎵\n\n\
         👉 Use {prefix}generate to start creating your unique music track. \
         (Remember you need rank or password) 🎤\n\
         👉 Use {prefix}stop to cancel all and clear memory to start over 🎧"
    )
}

pub fn stopped_text(prefix: &str) -> String {
    format!("Generation stopped. 🚫 You can start again with {prefix}generate.")
}

pub const NO_SESSION: &str = "No active session to stop. 🚫";
pub const NOT_PERMITTED: &str = "⛔ You do not have permission to use this command.";

/// Listing sent after `reload_users`
pub fn reloaded_text(users: &[UserSummary]) -> String {
    let mut text = String::from("🔄 User data has been reloaded. Here are the current limits:\n");
    for user in users {
        // Writing to a String is infallible
        writeln!(text, "{}: {}", user.username, user.limit_display).unwrap();
    }
    text
}

pub fn credits_text(credits: &Credits) -> String {
    format!(
        "💰 Credits Information:\nᗚ Available: {}\nᗚ Usage: {}",
        credits.available, credits.monthly_usage
    )
}
