use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use chorus_store::{Quota, UserSummary};
use http::StatusCode;
use serde::Deserialize;

use crate::error::AdminError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    /// `-1` for unlimited
    pub limit: Quota,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserChanges {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub limit: Option<Quota>,
}

pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserSummary>> {
    Json(state.store.list().await)
}

/// Add a user, or replace one with the same name
pub async fn create_user(
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> Result<impl IntoResponse, AdminError> {
    let created = state.store.upsert(&user.username, &user.password, user.limit).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };

    let summary = UserSummary {
        limit_display: user.limit.to_string(),
        username: user.username,
        limit: user.limit,
    };
    Ok((status, Json(summary)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(changes): Json<UserChanges>,
) -> Result<Json<UserSummary>, AdminError> {
    let summary = state
        .store
        .update(&username, changes.password.as_deref(), changes.limit)
        .await?;
    Ok(Json(summary))
}

pub async fn delete_user(State(state): State<AppState>, Path(username): Path<String>) -> Result<StatusCode, AdminError> {
    if state.store.remove(&username).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AdminError::NotFound(format!("user '{username}'")))
    }
}

/// Re-read the credential file
pub async fn reload_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, AdminError> {
    Ok(Json(state.store.reload().await?))
}
