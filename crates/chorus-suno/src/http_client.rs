use std::time::Duration;

use reqwest::Client;

use crate::error::{RemoteError, Result};

/// HTTP client shared by every call to the generation service
pub fn http_client(request_timeout: Duration) -> Result<Client> {
    let mut headers = http::HeaderMap::new();
    headers.insert(http::header::CONNECTION, http::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
        .build()
        .map_err(|e| RemoteError::ConfigError(format!("failed to build HTTP client: {e}")))
}
