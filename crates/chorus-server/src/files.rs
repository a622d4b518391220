//! Browsing and cleanup of the downloads directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Json;
use axum::extract::{Path as UrlPath, Query, State};
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::AdminError;
use crate::state::AppState;

/// One file in the downloads directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    /// RFC 3339 modification time
    pub modified: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    /// Remove files older than this many days; defaults to the retention window
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub removed: Vec<String>,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, AdminError> {
    Ok(Json(list_files(&state.downloads.directory).await?))
}

/// Serve a file as an attachment
pub async fn download(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Response, AdminError> {
    let path = resolve(&state.downloads.directory, &name)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AdminError::NotFound(format!("file '{name}'"))),
        Err(e) => return Err(e.into()),
    };

    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', ""));
    let disposition =
        HeaderValue::from_bytes(disposition.as_bytes()).unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn delete(State(state): State<AppState>, UrlPath(name): UrlPath<String>) -> Result<StatusCode, AdminError> {
    let path = resolve(&state.downloads.directory, &name)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            tracing::info!(file = %name, "file deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdminError::NotFound(format!("file '{name}'"))),
        Err(e) => Err(e.into()),
    }
}

pub async fn clear(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<ClearResult>, AdminError> {
    let days = params.days.unwrap_or(state.downloads.retention_days);
    let removed = clear_older_than(&state.downloads.directory, days).await?;
    Ok(Json(ClearResult { removed }))
}

/// Map a file name from the URL to a path inside `dir`
///
/// Anything that could leave the directory is rejected.
fn resolve(dir: &Path, name: &str) -> Result<PathBuf, AdminError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(AdminError::BadRequest(format!("invalid file name '{name}'")));
    }
    Ok(dir.join(name))
}

/// Regular files in `dir` sorted by name; a missing directory is empty
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| Timestamp::try_from(time).ok())
            .map(|ts| ts.to_string())
            .unwrap_or_default();

        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Delete regular files last modified more than `days` days ago
pub async fn clear_older_than(dir: &Path, days: u32) -> std::io::Result<Vec<String>> {
    let cutoff = Timestamp::now()
        .checked_sub(SignedDuration::from_hours(24 * i64::from(days)))
        .unwrap_or(Timestamp::MIN);

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified().ok().and_then(|time| Timestamp::try_from(time).ok());
        if modified.is_some_and(|modified| modified < cutoff) {
            tokio::fs::remove_file(entry.path()).await?;
            removed.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    if !removed.is_empty() {
        tracing::info!(dir = %dir.display(), days, removed = removed.len(), "old files removed");
    }
    removed.sort();
    Ok(removed)
}

/// Periodic removal of files older than the retention window
pub struct Sweeper {
    pub dir: PathBuf,
    pub retention_days: u32,
    pub every: Duration,
}

impl Sweeper {
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::debug!(dir = %self.dir.display(), every = ?self.every, "retention sweep scheduled");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = clear_older_than(&self.dir, self.retention_days).await {
                        tracing::warn!(dir = %self.dir.display(), error = %e, "retention sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn traversal_is_rejected() {
        let dir = Path::new("/srv/downloads");
        assert!(resolve(dir, "../users.txt").is_err());
        assert!(resolve(dir, "a/b.mp3").is_err());
        assert!(resolve(dir, "a\\b.mp3").is_err());
        assert!(resolve(dir, ".hidden").is_err());
        assert!(resolve(dir, "").is_err());
        assert_eq!(resolve(dir, "Rain Song_v1.mp3").unwrap(), dir.join("Rain Song_v1.mp3"));
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let files = list_files(&dir.path().join("absent")).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn lists_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"bb").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let files = list_files(dir.path()).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.mp3", "b.mp3"]);
        assert_eq!(files[1].size, 2);
        assert!(!files[0].modified.is_empty());
    }

    #[tokio::test]
    async fn clears_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.mp3");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(dir.path().join("new.mp3"), b"x").unwrap();

        let ten_days_ago = SystemTime::now() - Duration::from_secs(10 * 24 * 3600);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(ten_days_ago)
            .unwrap();

        let removed = clear_older_than(dir.path(), 7).await.unwrap();
        assert_eq!(removed, ["old.mp3"]);
        assert!(dir.path().join("new.mp3").exists());

        let removed = clear_older_than(dir.path(), 0).await.unwrap();
        assert_eq!(removed, ["new.mp3"]);
    }
}
