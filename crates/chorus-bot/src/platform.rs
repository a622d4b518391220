pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use chorus_config::PlatformConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatError, ChatSink, IncomingMessage};

/// Inbound side of a chat platform
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Forward inbound text messages until `shutdown` fires or the receiver
    /// is dropped
    async fn run(&self, inbound: mpsc::Sender<IncomingMessage>, shutdown: CancellationToken) -> Result<(), ChatError>;
}

/// Both halves of a connected platform adapter
#[derive(Clone)]
pub struct Platform {
    pub sink: Arc<dyn ChatSink>,
    pub source: Arc<dyn MessageSource>,
}

/// Build the adapter named by the configuration
pub fn build_platform(config: &PlatformConfig) -> Result<Platform, ChatError> {
    match config {
        PlatformConfig::Telegram {
            token,
            api_url,
            poll_timeout,
        } => {
            let adapter = Arc::new(telegram::TelegramAdapter::new(
                token.clone(),
                api_url.clone(),
                *poll_timeout,
            )?);
            tracing::debug!(platform = "telegram", "chat platform initialized");

            Ok(Platform {
                sink: adapter.clone(),
                source: adapter,
            })
        }
    }
}
