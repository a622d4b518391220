//! `POST /api/generate`: one-shot generation over HTTP

use axum::Json;
use axum::extract::State;
use chorus_suno::GenerationRequest;
use serde::{Deserialize, Serialize};

use crate::error::AdminError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Song description, or lyrics in custom mode
    #[serde(default)]
    pub input: Option<String>,
    /// `custom` or `default`
    #[serde(default)]
    pub mode: Option<String>,
    /// Style tags, custom mode only
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Names of the saved files in the downloads directory
    pub files: Vec<String>,
}

impl GenerateBody {
    fn into_request(self) -> Result<GenerationRequest, AdminError> {
        let input = self
            .input
            .filter(|input| !input.trim().is_empty())
            .ok_or_else(|| AdminError::BadRequest("Missing input text".to_string()))?;

        let custom = self.mode.as_deref().is_some_and(|mode| mode.eq_ignore_ascii_case("custom"));
        Ok(if custom {
            GenerationRequest::custom(input, self.tags.unwrap_or_default(), None)
        } else {
            GenerationRequest::describe(input)
        })
    }
}

/// Generate and save tracks, answering once every file is written
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, AdminError> {
    let request = body.into_request()?;
    let dir = &state.downloads.directory;

    let tracks = tokio::time::timeout(state.generation_timeout, state.provider.generate(&request))
        .await
        .map_err(|_| AdminError::TimedOut)??;

    let mut files = Vec::with_capacity(tracks.len());
    for track in tracks {
        let path = state.provider.download(track, dir).await?;
        if let Some(name) = path.file_name() {
            files.push(name.to_string_lossy().into_owned());
        }
    }

    tracing::info!(custom = request.is_custom, files = files.len(), "api generation saved");
    Ok(Json(GenerateResponse { files }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(input: Option<&str>, mode: Option<&str>, tags: Option<&str>) -> GenerateBody {
        GenerateBody {
            input: input.map(str::to_owned),
            mode: mode.map(str::to_owned),
            tags: tags.map(str::to_owned),
        }
    }

    #[test]
    fn missing_or_blank_input_is_rejected() {
        assert!(matches!(body(None, None, None).into_request(), Err(AdminError::BadRequest(_))));
        assert!(matches!(body(Some("  "), None, None).into_request(), Err(AdminError::BadRequest(_))));
    }

    #[test]
    fn tags_only_apply_in_custom_mode() {
        let request = body(Some("rain"), Some("default"), Some("pop")).into_request().unwrap();
        assert!(!request.is_custom);
        assert_eq!(request.tags, None);

        let request = body(Some("la la"), Some("custom"), Some("pop")).into_request().unwrap();
        assert!(request.is_custom);
        assert_eq!(request.tags.as_deref(), Some("pop"));
    }
}
