#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod http_client;
mod provider;
mod types;

use std::sync::Arc;

pub use error::{RemoteError, Result};
pub use provider::{MusicProvider, suno::SunoProvider};
pub use types::{Credits, GenerationRequest, Track, TrackStatus};

/// Build the configured music provider
pub fn build_provider(config: &chorus_config::Config) -> Result<Arc<dyn MusicProvider>> {
    let provider = SunoProvider::from_config("suno", &config.suno)?;
    tracing::debug!(base_url = %config.suno.base_url, "music provider initialized");
    Ok(Arc::new(provider))
}
