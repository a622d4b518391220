#![allow(dead_code)]

pub mod config;
pub mod mock_suno;
pub mod server;

use std::time::Duration;

/// Poll `check` until it holds or `within` elapses
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
