use std::path::Path;

use async_trait::async_trait;

/// A chat user as seen by the bot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    /// Stable platform id, used to key sessions
    pub id: String,
    /// Display/user name, used to look up credentials
    pub name: String,
    /// Platform roles held in the channel the message came from
    pub roles: Vec<String>,
}

/// A room, group, channel or direct conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub id: String,
    /// One-to-one conversation with a single user
    pub private: bool,
}

/// Inbound text message from a platform adapter
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub actor: Actor,
    pub channel: ChannelRef,
    pub text: String,
}

/// Errors raised by platform adapters
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Platform rejected or failed to deliver a text message
    #[error("send failed: {0}")]
    Send(String),

    /// File could not be read or uploaded
    #[error("file upload failed: {0}")]
    Upload(String),

    /// Connection-level or configuration failure
    #[error("platform error: {0}")]
    Platform(String),
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Post a text message
    async fn send_message(&self, channel: &ChannelRef, text: &str) -> Result<(), ChatError>;

    /// Upload a local file as an attachment named `display_name`
    async fn send_file(&self, channel: &ChannelRef, path: &Path, display_name: &str) -> Result<(), ChatError>;

    /// The private conversation with `actor`
    fn direct_channel(&self, actor: &Actor) -> ChannelRef;

    /// Platform name for logs
    fn name(&self) -> &str;
}

/// Post a message, logging instead of failing when the platform refuses it
pub(crate) async fn notify(sink: &dyn ChatSink, channel: &ChannelRef, text: &str) {
    if let Err(e) = sink.send_message(channel, text).await {
        tracing::warn!(platform = sink.name(), channel = %channel.id, error = %e, "failed to send message");
    }
}
