use serde::{Deserialize, Serialize};

/// Parameters of one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Lyrics (custom mode) or song description (default mode)
    pub prompt: String,
    /// Style tags, only sent in custom mode
    pub tags: Option<String>,
    /// Song title, only sent in custom mode
    pub title: Option<String>,
    pub is_custom: bool,
    /// Return only once every clip has playable audio
    pub wait_for_completion: bool,
}

impl GenerationRequest {
    /// Request built from a plain song description
    pub fn describe(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            tags: None,
            title: None,
            is_custom: false,
            wait_for_completion: true,
        }
    }

    /// Request built from lyrics and style tags
    pub fn custom(lyrics: impl Into<String>, tags: impl Into<String>, title: Option<String>) -> Self {
        Self {
            prompt: lyrics.into(),
            tags: Some(tags.into()),
            title,
            is_custom: true,
            wait_for_completion: true,
        }
    }
}

/// Handle to one generated clip, consumed by `download`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub status: TrackStatus,
}

impl Track {
    /// Audio can be fetched
    pub fn is_playable(&self) -> bool {
        matches!(self.status, TrackStatus::Streaming | TrackStatus::Complete)
            && self.audio_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Rendering state reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Submitted,
    Queued,
    Streaming,
    Complete,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Account credit balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(rename = "credits_left")]
    pub available: i64,
    pub monthly_usage: i64,
    #[serde(default)]
    pub monthly_limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_json_deserializes() {
        let track: Track = serde_json::from_str(
            r#"{"id":"abc","title":"Rain","audio_url":"https://cdn/abc.mp3","status":"complete","tags":"pop"}"#,
        )
        .unwrap();

        assert_eq!(track.id, "abc");
        assert_eq!(track.status, TrackStatus::Complete);
        assert!(track.is_playable());
    }

    #[test]
    fn unknown_status_is_not_playable() {
        let track: Track = serde_json::from_str(r#"{"id":"x","audio_url":"u","status":"rendering"}"#).unwrap();
        assert_eq!(track.status, TrackStatus::Unknown);
        assert!(!track.is_playable());
    }

    #[test]
    fn streaming_without_url_is_not_playable() {
        let track: Track = serde_json::from_str(r#"{"id":"x","audio_url":"","status":"streaming"}"#).unwrap();
        assert!(!track.is_playable());
    }

    #[test]
    fn credits_use_service_field_names() {
        let credits: Credits =
            serde_json::from_str(r#"{"credits_left":40,"period":"day","monthly_limit":50,"monthly_usage":10}"#)
                .unwrap();
        assert_eq!(credits.available, 40);
        assert_eq!(credits.monthly_usage, 10);
        assert_eq!(credits.monthly_limit, Some(50));
    }
}
