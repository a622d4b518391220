//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use chorus_config::{
    AdminConfig, BotConfig, Config, ConversationConfig, DownloadsConfig, GateConfig, GenerationConfig, PasswordMode,
    PlatformConfig, ServerConfig, StoreConfig, SunoConfig,
};
use secrecy::SecretString;

pub const ADMIN_SECRET: &str = "admin-secret";
pub const API_KEY: &str = "api-key";

/// Builder for constructing test configurations rooted in a temp directory
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal config keeping the credential file and downloads under `dir`
    pub fn new(dir: &Path) -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                store: StoreConfig {
                    path: dir.join("users.txt"),
                },
                downloads: DownloadsConfig {
                    directory: dir.join("downloads"),
                    ..DownloadsConfig::default()
                },
                generation: GenerationConfig {
                    timeout: Duration::from_secs(10),
                    ..GenerationConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Point the provider at a mock backend
    pub fn with_suno(mut self, base_url: &str) -> Self {
        self.config.suno = SunoConfig {
            base_url: base_url.parse().expect("valid URL"),
            cookie: Some(SecretString::from("session=test")),
            poll_interval: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
        };
        self
    }

    /// Mount the admin panel and the HTTP generation API
    pub fn with_admin(mut self) -> Self {
        self.config.admin = AdminConfig {
            secret: Some(SecretString::from(ADMIN_SECRET)),
            api_key: Some(SecretString::from(API_KEY)),
        };
        self
    }

    /// Enable the bot; the platform itself is supplied by the test
    pub fn with_bot(mut self, gate: GateConfig) -> Self {
        self.config.bot = Some(BotConfig {
            command_prefix: "/".to_string(),
            owners: vec!["owner-id".to_string()],
            platform: PlatformConfig::Telegram {
                token: SecretString::from("unused"),
                api_url: None,
                poll_timeout: 30,
            },
            gate,
            conversation: ConversationConfig::default(),
        });
        self
    }

    /// Keep delivered files on disk
    pub fn retaining_files(mut self) -> Self {
        self.config.generation.retain_files = true;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

/// Gate passing anyone who writes in `channel`, password otherwise
pub fn membership_gate(channel: &str) -> GateConfig {
    GateConfig {
        required_channel: Some(channel.to_owned()),
        password: PasswordMode::PerUser,
        membership_sufficient: true,
        password_timeout: Duration::from_secs(5),
        ..GateConfig::default()
    }
}
