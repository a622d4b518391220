use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::MusicProvider;
use crate::{
    error::{RemoteError, Result},
    http_client::http_client,
    types::{Credits, GenerationRequest, Track, TrackStatus},
};

/// Client for a suno-api compatible HTTP service
pub struct SunoProvider {
    client: Client,
    base_url: Url,
    cookie: Option<SecretString>,
    poll_interval: Duration,
    name: String,
}

impl SunoProvider {
    /// Build a provider from its configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(name: impl Into<String>, config: &chorus_config::SunoConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout)?,
            base_url: config.base_url.clone(),
            cookie: config.cookie.clone().filter(|cookie| !cookie.expose_secret().is_empty()),
            poll_interval: config.poll_interval,
            name: name.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::ConfigError(format!("invalid endpoint {path}: {e}")))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.cookie {
            Some(ref cookie) => builder.header(http::header::COOKIE, cookie.expose_secret()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.authorize(builder).send().await.map_err(|e| {
            tracing::error!("generation service request failed: {e}");
            RemoteError::ConnectionError(format!("Failed to reach generation service: {e}"))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::ConnectionError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            tracing::error!("generation service error ({status}): {body}");

            return Err(match status.as_u16() {
                401 | 403 => RemoteError::AuthenticationFailed(body),
                _ => RemoteError::ProviderApiError {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(format!("{e}: {body}")))
    }

    /// Poll clip status until every clip can be downloaded
    async fn wait_until_playable(&self, mut tracks: Vec<Track>) -> Result<Vec<Track>> {
        let ids = tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(",");
        let mut url = self.endpoint("api/get")?;
        url.query_pairs_mut().append_pair("ids", &ids);

        loop {
            if let Some(failed) = tracks.iter().find(|t| t.status == TrackStatus::Error) {
                return Err(RemoteError::GenerationFailed(format!("clip {} failed to render", failed.id)));
            }

            if tracks.iter().all(Track::is_playable) {
                return Ok(tracks);
            }

            tracing::debug!(ids = %ids, "clips not ready, polling again");
            tokio::time::sleep(self.poll_interval).await;

            let polled: Vec<Track> = self.send(self.client.get(url.clone())).await?;
            if polled.is_empty() {
                return Err(RemoteError::InvalidResponse(format!("no clips returned for ids {ids}")));
            }
            tracks = polled;
        }
    }
}

#[derive(Serialize)]
struct DescriptionBody<'a> {
    prompt: &'a str,
    make_instrumental: bool,
    wait_audio: bool,
}

#[derive(Serialize)]
struct CustomBody<'a> {
    prompt: &'a str,
    tags: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    make_instrumental: bool,
    wait_audio: bool,
}

#[async_trait]
impl MusicProvider for SunoProvider {
    async fn credits(&self) -> Result<Credits> {
        let url = self.endpoint("api/get_limit")?;
        self.send(self.client.get(url)).await
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Track>> {
        tracing::debug!(
            custom = request.is_custom,
            prompt_len = request.prompt.len(),
            "submitting generation request"
        );

        let builder = if request.is_custom {
            let body = CustomBody {
                prompt: &request.prompt,
                tags: request.tags.as_deref().unwrap_or_default(),
                title: request.title.as_deref(),
                make_instrumental: false,
                wait_audio: false,
            };
            self.client.post(self.endpoint("api/custom_generate")?).json(&body)
        } else {
            let body = DescriptionBody {
                prompt: &request.prompt,
                make_instrumental: false,
                wait_audio: false,
            };
            self.client.post(self.endpoint("api/generate")?).json(&body)
        };

        let tracks: Vec<Track> = self.send(builder).await?;
        if tracks.is_empty() {
            return Err(RemoteError::InvalidResponse("service returned no clips".to_string()));
        }

        tracing::info!(clips = tracks.len(), "generation submitted");

        if request.wait_for_completion {
            self.wait_until_playable(tracks).await
        } else {
            Ok(tracks)
        }
    }

    async fn download(&self, track: Track, dir: &Path) -> Result<PathBuf> {
        let source = track
            .audio_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RemoteError::MissingAudio(track.id.clone()))?;

        let mut response = self
            .client
            .get(source)
            .send()
            .await
            .map_err(|e| RemoteError::ConnectionError(format!("Failed to fetch audio: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteError::ProviderApiError {
                status: status.as_u16(),
                message,
            });
        }

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.{}", track.id, audio_extension(source)));

        match write_body(&mut response, &path).await {
            Ok(written) => {
                tracing::debug!(track = %track.id, bytes = written, path = %path.display(), "clip downloaded");
                Ok(path)
            }
            Err(e) => {
                // A partial file is never handed out
                if let Err(remove) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %remove, "failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stream the response body into a new file at `path`
async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<usize> {
    let mut file = tokio::fs::File::create(path).await?;

    let mut written = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| RemoteError::ConnectionError(format!("Audio stream interrupted: {e}")))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;

    Ok(written)
}

/// File extension taken from the audio URL path, `mp3` when absent
fn audio_extension(source: &str) -> String {
    Url::parse(source)
        .ok()
        .and_then(|url| {
            let last = url.path_segments()?.next_back()?.to_owned();
            let (_, ext) = last.rsplit_once('.')?;
            (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| "mp3".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url_path() {
        assert_eq!(audio_extension("https://cdn1.suno.ai/abc.mp3"), "mp3");
        assert_eq!(audio_extension("https://cdn1.suno.ai/abc.WAV?sig=1"), "wav");
    }

    #[test]
    fn extension_defaults_to_mp3() {
        assert_eq!(audio_extension("https://audiopipe.suno.ai/?item_id=abc"), "mp3");
        assert_eq!(audio_extension("not a url"), "mp3");
        assert_eq!(audio_extension("https://cdn/abc.weird-ext!"), "mp3");
    }

    #[test]
    fn custom_body_omits_missing_title() {
        let body = CustomBody {
            prompt: "la la",
            tags: "pop",
            title: None,
            make_instrumental: false,
            wait_audio: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["tags"], "pop");
        assert!(json.get("title").is_none());
    }

    #[tokio::test]
    async fn download_without_audio_url_fails() {
        let provider = SunoProvider::from_config("suno", &chorus_config::SunoConfig::default()).unwrap();
        let track = Track {
            id: "abc".to_string(),
            title: String::new(),
            audio_url: None,
            status: TrackStatus::Queued,
        };

        let err = provider.download(track, Path::new("/nonexistent")).await.unwrap_err();
        assert!(matches!(err, RemoteError::MissingAudio(id) if id == "abc"));
    }

    #[tokio::test]
    async fn interrupted_download_leaves_no_file() {
        use tokio::io::AsyncReadExt;

        // Promises more bytes than it sends, then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 4096\r\n\r\nID3 partial")
                .await
                .unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let provider = SunoProvider::from_config("suno", &chorus_config::SunoConfig::default()).unwrap();
        let track = Track {
            id: "cut".to_string(),
            title: String::new(),
            audio_url: Some(format!("http://{addr}/cut.mp3")),
            status: TrackStatus::Complete,
        };

        let err = provider.download(track, dir.path()).await.unwrap_err();
        assert!(matches!(err, RemoteError::ConnectionError(_)));
        assert!(!dir.path().join("cut.mp3").exists());
    }
}
