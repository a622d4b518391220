use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Remote music generation service
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SunoConfig {
    /// Base URL of the suno-api compatible service
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Session cookie forwarded to the service
    #[serde(default)]
    pub cookie: Option<SecretString>,
    /// Delay between status polls while clips are rendering
    #[serde(default = "default_poll_interval", deserialize_with = "crate::duration::deserialize")]
    pub poll_interval: Duration,
    /// Timeout for a single HTTP request to the service
    #[serde(default = "default_request_timeout", deserialize_with = "crate::duration::deserialize")]
    pub request_timeout: Duration,
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie: None,
            poll_interval: default_poll_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:3000").expect("valid default URL")
}

const fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}
