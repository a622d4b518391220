#![allow(clippy::must_use_candidate)]

pub mod admin;
pub mod bot;
pub mod downloads;
mod duration;
mod env;
pub mod generation;
pub mod health;
mod loader;
pub mod server;
pub mod store;
pub mod suno;
pub mod telemetry;

use serde::Deserialize;

pub use admin::*;
pub use bot::*;
pub use downloads::*;
pub use generation::*;
pub use health::*;
pub use server::*;
pub use store::*;
pub use suno::*;
pub use telemetry::*;

/// Top-level chorus configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Admin panel and HTTP generation API
    #[serde(default)]
    pub admin: AdminConfig,
    /// Remote music generation service
    #[serde(default)]
    pub suno: SunoConfig,
    /// Chat bot configuration
    #[serde(default)]
    pub bot: Option<BotConfig>,
    /// Generation job behaviour
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Downloaded audio directory and retention
    #[serde(default)]
    pub downloads: DownloadsConfig,
    /// Credential file location
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
