use axum::Json;
use axum::extract::State;
use chorus_suno::Credits;
use jiff::Timestamp;
use serde::Serialize;

use crate::error::AdminError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub started_at: String,
    pub uptime_seconds: i64,
    pub users: usize,
    pub provider: String,
    pub bot: Option<BotStatusResponse>,
}

#[derive(Debug, Serialize)]
pub struct BotStatusResponse {
    pub platform: String,
    pub active_sessions: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let uptime = Timestamp::now().duration_since(state.started_at);

    Json(StatusResponse {
        status: "running",
        started_at: state.started_at.to_string(),
        uptime_seconds: uptime.as_secs(),
        users: state.store.list().await.len(),
        provider: state.provider.name().to_owned(),
        bot: state.bot.as_ref().map(|bot| BotStatusResponse {
            platform: bot.platform.clone(),
            active_sessions: bot.sessions.len(),
        }),
    })
}

/// Remaining credits on the generation service account
pub async fn credits(State(state): State<AppState>) -> Result<Json<Credits>, AdminError> {
    Ok(Json(state.provider.credits().await?))
}
