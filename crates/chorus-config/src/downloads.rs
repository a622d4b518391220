use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Downloaded audio directory
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadsConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Files older than this many days are removed by a clear or sweep
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Run the retention sweep periodically when set
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub sweep_interval: Option<Duration>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            retention_days: default_retention_days(),
            sweep_interval: None,
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("downloads")
}

const fn default_retention_days() -> u32 {
    30
}
