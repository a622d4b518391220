//! In-memory chat sink and scripted provider for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chorus_suno::{Credits, GenerationRequest, MusicProvider, RemoteError, Track, TrackStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::{Actor, ChannelRef, ChatError, ChatSink, IncomingMessage};
use crate::platform::{MessageSource, Platform};

/// A platform made of a [`RecordingSink`] and a [`ChannelSource`]
///
/// Messages sent on the returned sender reach the dispatcher as if they came
/// from the chat platform.
pub fn recording_platform() -> (Platform, Arc<RecordingSink>, mpsc::Sender<IncomingMessage>) {
    let sink = Arc::new(RecordingSink::new());
    let (source, tx) = ChannelSource::new();

    let platform = Platform {
        sink: sink.clone(),
        source: Arc::new(source),
    };
    (platform, sink, tx)
}

/// Message source fed by the test itself
pub struct ChannelSource {
    rx: tokio::sync::Mutex<Option<mpsc::Receiver<IncomingMessage>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, mpsc::Sender<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(64);
        let source = Self {
            rx: tokio::sync::Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn run(&self, inbound: mpsc::Sender<IncomingMessage>, shutdown: CancellationToken) -> Result<(), ChatError> {
        let Some(mut rx) = self.rx.lock().await.take() else {
            return Err(ChatError::Platform("source already running".to_string()));
        };

        loop {
            let message = tokio::select! {
                () = shutdown.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            if inbound.send(message).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// A file handed to [`RecordingSink::send_file`]
#[derive(Debug, Clone)]
pub struct SentFile {
    pub channel: ChannelRef,
    pub path: PathBuf,
    pub display_name: String,
    /// The file was on disk at the time it was sent
    pub existed: bool,
    /// Text read from the file when it was sent
    pub contents: Option<String>,
}

/// Chat sink that records everything sent through it
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(ChannelRef, String)>>,
    files: Mutex<Vec<SentFile>>,
    send_delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before reading an uploaded file, like a slow upload
    #[must_use]
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    /// Every text message with the channel it went to, in order
    pub fn messages(&self) -> Vec<(ChannelRef, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|(_, text)| text).collect()
    }

    /// Text messages sent to one channel
    pub fn texts_in(&self, channel_id: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(channel, _)| channel.id == channel_id)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn files(&self) -> Vec<SentFile> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send_message(&self, channel: &ChannelRef, text: &str) -> Result<(), ChatError> {
        self.messages
            .lock()
            .map_err(|e| ChatError::Send(e.to_string()))?
            .push((channel.clone(), text.to_owned()));
        Ok(())
    }

    async fn send_file(&self, channel: &ChannelRef, path: &Path, display_name: &str) -> Result<(), ChatError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let contents = tokio::fs::read_to_string(path).await.ok();
        let existed = contents.is_some() || tokio::fs::try_exists(path).await.unwrap_or(false);
        self.files
            .lock()
            .map_err(|e| ChatError::Upload(e.to_string()))?
            .push(SentFile {
                channel: channel.clone(),
                path: path.to_owned(),
                display_name: display_name.to_owned(),
                existed,
                contents,
            });
        Ok(())
    }

    fn direct_channel(&self, actor: &Actor) -> ChannelRef {
        ChannelRef {
            id: actor.id.clone(),
            private: true,
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Provider returning canned tracks or a canned failure
pub struct ScriptedProvider {
    tracks: usize,
    failure: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<GenerationRequest>>,
    generated: AtomicUsize,
}

impl ScriptedProvider {
    /// Succeed with `count` playable tracks
    pub fn tracks(count: usize) -> Self {
        Self {
            tracks: count,
            failure: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
            generated: AtomicUsize::new(0),
        }
    }

    /// Fail every generation with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::tracks(0)
        }
    }

    /// Sleep before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MusicProvider for ScriptedProvider {
    async fn credits(&self) -> chorus_suno::Result<Credits> {
        Ok(Credits {
            available: 40,
            monthly_usage: 10,
            monthly_limit: Some(50),
        })
    }

    async fn generate(&self, request: &GenerationRequest) -> chorus_suno::Result<Vec<Track>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref message) = self.failure {
            return Err(RemoteError::GenerationFailed(message.clone()));
        }

        let batch = self.generated.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.tracks)
            .map(|i| Track {
                id: format!("clip-{batch}-{i}"),
                title: String::new(),
                audio_url: Some(format!("https://cdn.example/clip-{batch}-{i}.mp3")),
                status: TrackStatus::Complete,
            })
            .collect())
    }

    async fn download(&self, track: Track, dir: &Path) -> chorus_suno::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.mp3", track.id));
        tokio::fs::write(&path, track.id.as_bytes()).await?;
        Ok(path)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
