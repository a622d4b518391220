//! Routes inbound messages to commands, the gate and conversations
//!
//! Each actor gets a worker task fed by its own queue, so one actor's
//! messages are handled in order while different actors proceed
//! concurrently. Replies to an outstanding password challenge bypass the
//! queues.

use std::sync::Arc;

use chorus_config::{BotConfig, GateConfig, UnrecognizedModePolicy};
use chorus_store::CredentialStore;
use chorus_suno::MusicProvider;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::chat::{ChatSink, IncomingMessage, notify};
use crate::command::{self, Command};
use crate::gate::AuthorizationGate;
use crate::orchestrator::{DeliveryOptions, GenerationJob, Orchestrator};
use crate::replies::ReplyWaiters;
use crate::session::{MODE_PROMPT, SessionStore, Step};

/// Dispatcher behaviour taken from configuration
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub command_prefix: String,
    pub owners: Vec<String>,
    pub unrecognized_mode: UnrecognizedModePolicy,
    pub gate: GateConfig,
    pub delivery: DeliveryOptions,
}

impl BotSettings {
    pub fn from_config(config: &chorus_config::Config, bot: &BotConfig) -> Self {
        Self {
            command_prefix: bot.command_prefix.clone(),
            owners: bot.owners.clone(),
            unrecognized_mode: bot.conversation.unrecognized_mode,
            gate: bot.gate.clone(),
            delivery: DeliveryOptions::from_config(config),
        }
    }
}

/// Message dispatch loop shared by every platform adapter
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    settings: BotSettings,
    sink: Arc<dyn ChatSink>,
    provider: Arc<dyn MusicProvider>,
    store: CredentialStore,
    sessions: SessionStore,
    replies: ReplyWaiters,
    gate: AuthorizationGate,
    orchestrator: Orchestrator,
    workers: DashMap<String, mpsc::UnboundedSender<IncomingMessage>>,
    workers_shutdown: CancellationToken,
    jobs: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        settings: BotSettings,
        sink: Arc<dyn ChatSink>,
        provider: Arc<dyn MusicProvider>,
        store: CredentialStore,
    ) -> Self {
        let sessions = SessionStore::new();
        let replies = ReplyWaiters::new();
        let gate = AuthorizationGate::new(settings.gate.clone(), store.clone(), replies.clone(), Arc::clone(&sink));
        let orchestrator = Orchestrator::new(
            Arc::clone(&provider),
            store.clone(),
            sessions.clone(),
            Arc::clone(&sink),
            settings.delivery.clone(),
        );

        Self {
            inner: Arc::new(Inner {
                settings,
                sink,
                provider,
                store,
                sessions,
                replies,
                gate,
                orchestrator,
                workers: DashMap::new(),
                workers_shutdown: CancellationToken::new(),
                jobs: TaskTracker::new(),
            }),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    /// Consume inbound messages until the channel closes or `shutdown` fires,
    /// then wait for in-flight generation jobs
    pub async fn run(&self, mut inbound: mpsc::Receiver<IncomingMessage>, shutdown: CancellationToken) {
        tracing::info!(platform = self.inner.sink.name(), "dispatch loop started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => self.dispatch(message),
                    None => break,
                },
            }
        }

        self.inner.workers_shutdown.cancel();
        self.inner.workers.clear();

        let pending = self.inner.jobs.len();
        if pending > 0 {
            tracing::info!(jobs = pending, "waiting for generation jobs to finish");
        }
        self.wait_for_jobs().await;
        tracing::info!("dispatch loop stopped");
    }

    /// Route one message without waiting for it to be handled
    pub fn dispatch(&self, message: IncomingMessage) {
        let Err(message) = self.inner.replies.offer(message) else {
            return;
        };

        let actor_id = message.actor.id.clone();
        let mut worker = self
            .inner
            .workers
            .entry(actor_id.clone())
            .or_insert_with(|| self.spawn_worker(actor_id.clone()));

        if let Err(mpsc::error::SendError(message)) = worker.send(message) {
            let fresh = self.spawn_worker(actor_id);
            if fresh.send(message).is_ok() {
                *worker = fresh;
            }
        }
    }

    /// Start a worker that handles `actor_id`'s messages in order
    ///
    /// The worker retires once its queue is drained. Retiring and enqueueing
    /// both hold the map entry, so a message is never left in a retired queue.
    fn spawn_worker(&self, actor_id: String) -> mpsc::UnboundedSender<IncomingMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let own = tx.clone();
        let dispatcher = self.clone();
        let shutdown = self.inner.workers_shutdown.clone();

        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    () = shutdown.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = dispatcher.handle(message) => {}
                }

                let retired = dispatcher
                    .inner
                    .workers
                    .remove_if(&actor_id, |_, queued| queued.same_channel(&own) && rx.is_empty())
                    .is_some();
                if retired {
                    tracing::trace!(actor = %actor_id, "idle worker retired");
                    break;
                }
            }
        });

        tx
    }

    /// Handle one message to completion, except for spawned generation jobs
    pub async fn handle(&self, message: IncomingMessage) {
        match Command::parse(&message.text, &self.inner.settings.command_prefix) {
            Some(cmd) => self.handle_command(cmd, &message).await,
            None => self.handle_text(&message).await,
        }
    }

    async fn handle_command(&self, cmd: Command, message: &IncomingMessage) {
        let inner = &self.inner;
        let prefix = &inner.settings.command_prefix;
        let reply = |text: String| async move { notify(inner.sink.as_ref(), &message.channel, &text).await };

        tracing::debug!(actor = %message.actor.id, command = ?cmd, "command received");

        match cmd {
            Command::Help => reply(command::help_text(prefix)).await,
            Command::Generate => self.start_session(message).await,
            Command::Stop => {
                if inner.sessions.cancel(&message.actor.id) {
                    reply(command::stopped_text(prefix)).await;
                } else {
                    reply(command::NO_SESSION.to_string()).await;
                }
            }
            Command::ReloadUsers | Command::Credits if !self.is_owner(message) => {
                reply(command::NOT_PERMITTED.to_string()).await;
            }
            Command::ReloadUsers => match inner.store.reload().await {
                Ok(users) => reply(command::reloaded_text(&users)).await,
                Err(e) => {
                    tracing::error!(error = %e, "credential reload failed");
                    reply(format!("❗ Failed to reload users: {e}")).await;
                }
            },
            Command::Credits => match inner.provider.credits().await {
                Ok(credits) => reply(command::credits_text(&credits)).await,
                Err(e) => reply(format!("⁉️ Failed to get credits info: {e}")).await,
            },
            Command::Unknown(name) => {
                tracing::debug!(actor = %message.actor.id, command = %name, "unknown command ignored");
            }
        }
    }

    fn is_owner(&self, message: &IncomingMessage) -> bool {
        self.inner.settings.owners.contains(&message.actor.id)
    }

    async fn start_session(&self, message: &IncomingMessage) {
        let inner = &self.inner;
        let actor = &message.actor;

        match inner.gate.authorize(message).await {
            Ok(how) => {
                inner.sessions.start(&actor.id, message.channel.clone());
                tracing::info!(actor = %actor.id, channel = %message.channel.id, ?how, "session started");
                notify(inner.sink.as_ref(), &message.channel, MODE_PROMPT).await;
            }
            Err(denied) => {
                tracing::info!(actor = %actor.id, reason = %denied, "authorization denied");
                let direct = inner.sink.direct_channel(actor);
                notify(inner.sink.as_ref(), &direct, denied.message()).await;
            }
        }
    }

    async fn handle_text(&self, message: &IncomingMessage) {
        let inner = &self.inner;
        let actor = &message.actor;

        // Free text only counts in the channel where the session started
        let in_session_channel = inner
            .sessions
            .get(&actor.id)
            .is_some_and(|session| *session.channel() == message.channel);
        if !in_session_channel {
            return;
        }

        let Some(advance) = inner
            .sessions
            .apply(&actor.id, &message.text, inner.settings.unrecognized_mode)
        else {
            return;
        };

        match advance.step {
            Step::Prompt(prompt) => notify(inner.sink.as_ref(), &advance.channel, prompt).await,
            Step::Ignored => {}
            Step::Invalid(error) => {
                tracing::debug!(actor = %actor.id, %error, "input rejected");
                notify(inner.sink.as_ref(), &advance.channel, error.prompt(advance.mode)).await;
            }
            Step::Ready(completed) => {
                let job = GenerationJob {
                    session_id: advance.session_id,
                    actor: actor.clone(),
                    channel: advance.channel,
                    request: completed.generation_request(),
                    title: completed.title,
                };

                let orchestrator = inner.orchestrator.clone();
                inner.jobs.spawn(async move {
                    orchestrator.run(job).await;
                });
            }
        }
    }

    /// Wait until every spawned generation job has finished
    pub async fn wait_for_jobs(&self) {
        let jobs = &self.inner.jobs;
        jobs.close();
        jobs.wait().await;
        jobs.reopen();
    }
}
