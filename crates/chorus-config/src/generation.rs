use std::time::Duration;

use serde::Deserialize;

/// Generation job behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Upper bound on a single remote generation call
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    /// How often a progress note is posted while waiting
    #[serde(
        default = "default_progress_interval",
        deserialize_with = "crate::duration::deserialize"
    )]
    pub progress_interval: Duration,
    /// Keep delivered files in the downloads directory
    #[serde(default)]
    pub retain_files: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            progress_interval: default_progress_interval(),
            retain_files: false,
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

const fn default_progress_interval() -> Duration {
    Duration::from_secs(2 * 60)
}
