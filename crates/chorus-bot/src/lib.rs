#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod chat;
pub mod command;
pub mod dispatch;
pub mod gate;
pub mod orchestrator;
pub mod platform;
pub mod replies;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::Arc;

use chorus_store::CredentialStore;
use chorus_suno::MusicProvider;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use chat::{Actor, ChannelRef, ChatError, ChatSink, IncomingMessage};
pub use dispatch::{BotSettings, Dispatcher};
pub use gate::{AuthDenied, AuthorizationGate, Authorized};
pub use orchestrator::{DeliveryOptions, GenerationError, GenerationJob, GenerationOutcome, Orchestrator};
pub use platform::{MessageSource, Platform, build_platform};
pub use session::{CompletedRequest, Mode, Session, SessionStore, Stage, Step, ValidationError};

const INBOUND_CAPACITY: usize = 256;

/// A platform adapter wired to a dispatcher
pub struct BotRuntime {
    dispatcher: Dispatcher,
    source: Arc<dyn MessageSource>,
    platform: String,
}

impl BotRuntime {
    pub fn new(
        settings: BotSettings,
        platform: Platform,
        provider: Arc<dyn MusicProvider>,
        store: CredentialStore,
    ) -> Self {
        Self {
            platform: platform.sink.name().to_owned(),
            dispatcher: Dispatcher::new(settings, platform.sink, provider, store),
            source: platform.source,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn platform_name(&self) -> &str {
        &self.platform
    }

    /// Poll the platform and dispatch messages until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);

        let source = Arc::clone(&self.source);
        let poll_shutdown = shutdown.clone();
        let poller = tokio::spawn(async move { source.run(tx, poll_shutdown).await });

        self.dispatcher.run(rx, shutdown).await;

        poller.await??;
        Ok(())
    }
}
