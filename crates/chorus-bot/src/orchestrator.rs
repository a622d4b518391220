//! Runs one generation job from a completed conversation to delivered files

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chorus_store::{CredentialStore, Quota};
use chorus_suno::{GenerationRequest, MusicProvider, RemoteError, Track};
use tokio::time::Instant;
use uuid::Uuid;

use crate::chat::{Actor, ChannelRef, ChatError, ChatSink, notify};
use crate::session::SessionStore;

pub const GENERATING: &str = "Generating your music... please wait. 🎶";
pub const THANK_YOU: &str = "Thank you for using the bot! 🎧";

const FALLBACK_TITLE: &str = "generated_music";

/// Errors that end a generation job
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("generation did not finish within {} min", .0.as_secs() / 60)]
    TimedOut(Duration),

    #[error(transparent)]
    Delivery(#[from] ChatError),

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where and how finished tracks are handed over
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    pub downloads_dir: PathBuf,
    pub retain_files: bool,
    pub timeout: Duration,
    pub progress_interval: Duration,
}

impl DeliveryOptions {
    pub fn from_config(config: &chorus_config::Config) -> Self {
        Self {
            downloads_dir: config.downloads.directory.clone(),
            retain_files: config.generation.retain_files,
            timeout: config.generation.timeout,
            progress_interval: config.generation.progress_interval,
        }
    }
}

/// A completed conversation ready to be sent to the provider
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub session_id: Uuid,
    pub actor: Actor,
    pub channel: ChannelRef,
    pub title: String,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Display names of the delivered files and the quota left afterwards
    Delivered { files: Vec<String>, quota: Option<Quota> },
    /// Error text shown to the user
    Failed(String),
}

/// Drives the provider and delivers its tracks to the chat
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn MusicProvider>,
    store: CredentialStore,
    sessions: SessionStore,
    sink: Arc<dyn ChatSink>,
    options: DeliveryOptions,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn MusicProvider>,
        store: CredentialStore,
        sessions: SessionStore,
        sink: Arc<dyn ChatSink>,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            provider,
            store,
            sessions,
            sink,
            options,
        }
    }

    /// Generate, deliver and retire the session
    ///
    /// Quota is consumed only when every track was delivered. The session is
    /// removed only if it is still the one that started this job.
    pub async fn run(&self, job: GenerationJob) -> GenerationOutcome {
        notify(self.sink.as_ref(), &job.channel, GENERATING).await;

        let outcome = match self.generate_and_deliver(&job).await {
            Ok(files) => {
                let quota = match self.store.consume(&job.actor.name).await {
                    Ok(quota) => quota,
                    Err(e) => {
                        tracing::error!(actor = %job.actor.id, error = %e, "failed to record usage");
                        None
                    }
                };

                tracing::info!(
                    actor = %job.actor.id,
                    provider = self.provider.name(),
                    files = files.len(),
                    "generation delivered"
                );
                GenerationOutcome::Delivered { files, quota }
            }
            Err(e) => {
                tracing::warn!(actor = %job.actor.id, error = %e, "generation failed");
                let message = e.to_string();
                notify(
                    self.sink.as_ref(),
                    &job.channel,
                    &format!("❗ Failed to generate music: {message}"),
                )
                .await;
                GenerationOutcome::Failed(message)
            }
        };

        self.sessions.finish(&job.actor.id, job.session_id);

        if matches!(outcome, GenerationOutcome::Delivered { .. }) {
            notify(self.sink.as_ref(), &job.channel, THANK_YOU).await;
        }

        outcome
    }

    async fn generate_and_deliver(&self, job: &GenerationJob) -> Result<Vec<String>, GenerationError> {
        let tracks = self.generate_with_progress(job).await?;
        let title = sanitize_title(&job.title);

        let mut delivered = Vec::with_capacity(tracks.len());
        for (index, track) in tracks.into_iter().enumerate() {
            let downloaded = self.provider.download(track, &self.options.downloads_dir).await?;
            let display_name = versioned_name(&title, index + 1, &downloaded);

            // Jobs with the same title share display names, never paths
            let path = downloaded.with_file_name(format!("{}_{display_name}", job.session_id.simple()));
            if let Err(e) = tokio::fs::rename(&downloaded, &path).await {
                discard(&downloaded).await;
                return Err(e.into());
            }

            let sent = self.sink.send_file(&job.channel, &path, &display_name).await;

            if !self.options.retain_files {
                discard(&path).await;
            }

            sent?;
            delivered.push(display_name);
        }

        Ok(delivered)
    }

    /// Await the provider, posting a progress note every interval
    async fn generate_with_progress(&self, job: &GenerationJob) -> Result<Vec<Track>, GenerationError> {
        let started = Instant::now();
        let every = self.options.progress_interval;

        let mut generate = pin!(self.provider.generate(&job.request));
        let mut deadline = pin!(tokio::time::sleep(self.options.timeout));
        let mut progress = tokio::time::interval_at(started + every, every);

        loop {
            tokio::select! {
                biased;
                result = &mut generate => return Ok(result?),
                () = &mut deadline => return Err(GenerationError::TimedOut(self.options.timeout)),
                _ = progress.tick() => {
                    let minutes = started.elapsed().as_secs() / 60;
                    notify(
                        self.sink.as_ref(),
                        &job.channel,
                        &format!("⏳ Still generating... ({minutes} min elapsed)"),
                    )
                    .await;
                }
            }
        }
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove downloaded file");
    }
}

/// Title safe to use as a file name stem
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_TITLE.to_string()
    } else {
        cleaned
    }
}

/// `{title}_v{n}.{ext}`, keeping the downloaded file's extension
fn versioned_name(title: &str, version: usize, downloaded: &Path) -> String {
    match downloaded.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{title}_v{version}.{ext}"),
        None => format!("{title}_v{version}"),
    }
}
