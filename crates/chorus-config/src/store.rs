use std::path::PathBuf;

use serde::Deserialize;

/// Credential file location
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_path() }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("users.txt")
}
