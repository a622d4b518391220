pub mod suno;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{Credits, GenerationRequest, Track};

/// Trait for remote music generation services
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Remaining account credits
    async fn credits(&self) -> crate::error::Result<Credits>;

    /// Generate clips for a request; may take minutes when waiting for completion
    async fn generate(&self, request: &GenerationRequest) -> crate::error::Result<Vec<Track>>;

    /// Download a clip's audio into `dir`, returning the written file
    async fn download(&self, track: Track, dir: &Path) -> crate::error::Result<PathBuf>;

    /// Get the provider name
    fn name(&self) -> &str;
}
