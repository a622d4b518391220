//! Telegram Bot API adapter over HTTPS long polling

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::MessageSource;
use crate::chat::{Actor, ChannelRef, ChatError, ChatSink, IncomingMessage};

const DEFAULT_API_URL: &str = "https://api.telegram.org";
const MIN_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct TelegramAdapter {
    client: Client,
    api_url: String,
    token: SecretString,
    poll_timeout: u32,
}

impl TelegramAdapter {
    /// Build an adapter for the bot identified by `token`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(token: SecretString, api_url: Option<Url>, poll_timeout: u32) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(poll_timeout) + 10))
            .build()
            .map_err(|e| ChatError::Platform(format!("failed to build HTTP client: {e}")))?;

        let api_url = api_url
            .map_or_else(|| DEFAULT_API_URL.to_string(), |url| url.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            api_url,
            token,
            poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, request: reqwest::RequestBuilder) -> Result<T, String> {
        // Request errors embed the URL, which carries the token
        let response = request
            .send()
            .await
            .map_err(|e| format!("telegram {method} request failed: {}", e.without_url()))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| format!("telegram {method} invalid response: {}", e.without_url()))?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(format!(
                "telegram {method} failed: {}",
                description.as_deref().unwrap_or("ok=false")
            )),
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, String> {
        let query = GetUpdates {
            offset,
            timeout: self.poll_timeout,
            allowed_updates: r#"["message"]"#,
        };
        let request = self.client.get(self.method_url("getUpdates")).query(&query);
        self.call("getUpdates", request).await
    }
}

#[async_trait]
impl ChatSink for TelegramAdapter {
    async fn send_message(&self, channel: &ChannelRef, text: &str) -> Result<(), ChatError> {
        let body = SendMessage {
            chat_id: &channel.id,
            text,
        };
        let request = self.client.post(self.method_url("sendMessage")).json(&body);

        self.call::<serde_json::Value>("sendMessage", request)
            .await
            .map(|_| ())
            .map_err(ChatError::Send)
    }

    async fn send_file(&self, channel: &ChannelRef, path: &Path, display_name: &str) -> Result<(), ChatError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ChatError::Upload(format!("failed to read {}: {e}", path.display())))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", channel.id.clone())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(display_name.to_owned()),
            );
        let request = self.client.post(self.method_url("sendDocument")).multipart(form);

        self.call::<serde_json::Value>("sendDocument", request)
            .await
            .map(|_| ())
            .map_err(ChatError::Upload)
    }

    fn direct_channel(&self, actor: &Actor) -> ChannelRef {
        // A private chat's id equals the user's id
        ChannelRef {
            id: actor.id.clone(),
            private: true,
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[async_trait]
impl MessageSource for TelegramAdapter {
    async fn run(&self, inbound: mpsc::Sender<IncomingMessage>, shutdown: CancellationToken) -> Result<(), ChatError> {
        let mut offset = 0_i64;
        let mut backoff = MIN_BACKOFF;

        tracing::info!(poll_timeout = self.poll_timeout, "telegram polling started");

        loop {
            let polled = tokio::select! {
                () = shutdown.cancelled() => break,
                polled = self.get_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => {
                    backoff = MIN_BACKOFF;
                    updates
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in = ?backoff, "telegram poll failed");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.into_incoming() else {
                    continue;
                };
                if inbound.send(message).await.is_err() {
                    tracing::debug!("dispatcher gone, stopping telegram polling");
                    return Ok(());
                }
            }
        }

        tracing::info!("telegram polling stopped");
        Ok(())
    }
}

#[derive(Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u32,
    allowed_updates: &'static str,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    is_bot: bool,
    username: Option<String>,
}

impl Update {
    /// Text messages from humans; everything else is dropped
    fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let from = message.from.filter(|user| !user.is_bot)?;
        let text = message.text?;

        let id = from.id.to_string();
        Some(IncomingMessage {
            actor: Actor {
                name: from.username.unwrap_or_else(|| id.clone()),
                id,
                roles: Vec::new(),
            },
            channel: ChannelRef {
                id: message.chat.id.to_string(),
                private: message.chat.kind == "private",
            },
            text,
        })
    }
}
