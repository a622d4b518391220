//! Test server wrapper that starts chorus on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use chorus_bot::IncomingMessage;
use chorus_bot::testing::{RecordingSink, recording_platform};
use chorus_config::Config;
use chorus_server::{Components, Server};
use chorus_store::CredentialStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    store: CredentialStore,
    chat: Option<ChatHandle>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

/// The in-memory chat platform the bot talks to
pub struct ChatHandle {
    pub sink: Arc<RecordingSink>,
    pub inbound: mpsc::Sender<IncomingMessage>,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// When the config enables the bot it is wired to an in-memory platform
    /// reachable through [`TestServer::chat`].
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let store = CredentialStore::open(&config.store.path).await?;
        let provider = chorus_suno::build_provider(&config)?;

        let (platform, chat) = if config.bot.is_some() {
            let (platform, sink, inbound) = recording_platform();
            (Some(platform), Some(ChatHandle { sink, inbound }))
        } else {
            (None, None)
        };

        let components = Components {
            store: store.clone(),
            provider,
            platform,
        };
        let server = Server::assemble(&config, components);

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.serve_on(listener, shutdown.clone()));

        Ok(Self {
            addr,
            shutdown,
            client: reqwest::Client::new(),
            store,
            chat,
            task: Some(task),
        })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Credential store shared with the server
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The in-memory chat platform
    ///
    /// # Panics
    ///
    /// Panics if the server was started without a bot
    pub fn chat(&self) -> &ChatHandle {
        self.chat.as_ref().expect("server started without a bot")
    }

    /// Stop the server and wait for in-flight work to finish
    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }
}

impl ChatHandle {
    /// Deliver a message as if `actor` typed it in `channel`
    pub async fn say(&self, actor: &str, channel: &str, text: &str) {
        let message = IncomingMessage {
            actor: chorus_bot::Actor {
                id: actor.to_owned(),
                name: actor.to_owned(),
                roles: Vec::new(),
            },
            channel: chorus_bot::ChannelRef {
                id: channel.to_owned(),
                private: channel == actor,
            },
            text: text.to_owned(),
        };
        self.inbound.send(message).await.expect("bot is running");
    }

    /// Everything the bot posted to `channel`
    pub fn texts_in(&self, channel: &str) -> Vec<String> {
        self.sink.texts_in(channel)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
