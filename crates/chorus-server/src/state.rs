use std::sync::Arc;
use std::time::Duration;

use chorus_bot::SessionStore;
use chorus_config::DownloadsConfig;
use chorus_store::CredentialStore;
use chorus_suno::MusicProvider;
use jiff::Timestamp;

/// State shared by the admin and API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: CredentialStore,
    pub provider: Arc<dyn MusicProvider>,
    pub downloads: DownloadsConfig,
    /// Upper bound for `POST /api/generate`
    pub generation_timeout: Duration,
    pub started_at: Timestamp,
    pub bot: Option<BotStatus>,
}

/// Running chat bot, as reported by `/status`
#[derive(Clone)]
pub struct BotStatus {
    pub platform: String,
    pub sessions: SessionStore,
}
