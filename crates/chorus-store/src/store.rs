use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::record::{self, Credential};
use crate::{PasswordHash, Quota, Result, StoreError};

type Users = IndexMap<String, Credential>;

/// Public view of a credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub limit: Quota,
    pub limit_display: String,
}

/// Flat-file credential store
///
/// Every mutation holds the lock while the whole file is rewritten, so bot
/// decrements and admin edits are applied one at a time and never lost.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    users: Mutex<Users>,
}

impl CredentialStore {
    /// Open the store, treating a missing file as empty
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let users = load(path.clone()).await?;

        tracing::info!(path = %path.display(), users = users.len(), "credential store loaded");

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                users: Mutex::new(users),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Re-read the backing file, replacing the in-memory records
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read; the previous records are kept
    pub async fn reload(&self) -> Result<Vec<UserSummary>> {
        let mut users = self.inner.users.lock().await;
        *users = load(self.inner.path.clone()).await?;

        tracing::info!(users = users.len(), "credential store reloaded");
        Ok(summaries(&users))
    }

    pub async fn get(&self, username: &str) -> Option<Credential> {
        self.inner.users.lock().await.get(username).cloned()
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.inner.users.lock().await.contains_key(username)
    }

    pub async fn list(&self) -> Vec<UserSummary> {
        summaries(&*self.inner.users.lock().await)
    }

    /// Check a password for a registered user; unknown users never verify
    pub async fn verify_password(&self, username: &str, candidate: &str) -> bool {
        self.inner
            .users
            .lock()
            .await
            .get(username)
            .is_some_and(|credential| credential.password.verify(candidate))
    }

    /// Add a user or replace an existing one; returns `true` when created
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid username, an empty password, or a failed rewrite
    pub async fn upsert(&self, username: &str, password: &str, quota: Quota) -> Result<bool> {
        record::validate_username(username)?;
        if password.is_empty() {
            return Err(StoreError::EmptyPassword);
        }

        let credential = Credential {
            password: PasswordHash::new(password),
            quota,
        };

        let created = self
            .mutate(|users| Ok(users.insert(username.to_owned(), credential).is_none()))
            .await?;

        tracing::info!(username, %quota, created, "user saved");
        Ok(created)
    }

    /// Change the password and/or quota of an existing user
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownUser`] when the user does not exist
    pub async fn update(&self, username: &str, password: Option<&str>, quota: Option<Quota>) -> Result<UserSummary> {
        if password.is_some_and(str::is_empty) {
            return Err(StoreError::EmptyPassword);
        }

        let summary = self
            .mutate(|users| {
                let credential = users
                    .get_mut(username)
                    .ok_or_else(|| StoreError::UnknownUser(username.to_owned()))?;
                if let Some(password) = password {
                    credential.password = PasswordHash::new(password);
                }
                if let Some(quota) = quota {
                    credential.quota = quota;
                }
                Ok(summary(username, credential))
            })
            .await?;

        tracing::info!(username, limit = %summary.limit, "user updated");
        Ok(summary)
    }

    /// Delete a user; returns `false` if there was nothing to delete
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails
    pub async fn remove(&self, username: &str) -> Result<bool> {
        let removed = self.mutate(|users| Ok(users.shift_remove(username).is_some())).await?;
        if removed {
            tracing::info!(username, "user removed");
        }
        Ok(removed)
    }

    /// Record one successful generation for `username`
    ///
    /// Unlimited users are left untouched and the file is not rewritten.
    /// Returns the new quota, or `None` if the user is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewrite fails
    pub async fn consume(&self, username: &str) -> Result<Option<Quota>> {
        let mut users = self.inner.users.lock().await;

        let Some(current) = users.get(username).map(|c| c.quota) else {
            return Ok(None);
        };
        if current == Quota::Unlimited {
            return Ok(Some(current));
        }

        let mut next = users.clone();
        if let Some(credential) = next.get_mut(username) {
            credential.quota = current.consume();
        }
        persist(self.inner.path.clone(), &next).await?;
        *users = next;

        let quota = current.consume();
        tracing::debug!(username, %quota, "usage consumed");
        Ok(Some(quota))
    }

    /// Apply `change` to a copy of the records, rewrite the file, then commit
    async fn mutate<T>(&self, change: impl FnOnce(&mut Users) -> Result<T>) -> Result<T> {
        let mut users = self.inner.users.lock().await;

        let mut next = users.clone();
        let out = change(&mut next)?;
        persist(self.inner.path.clone(), &next).await?;
        *users = next;

        Ok(out)
    }
}

fn summary(username: &str, credential: &Credential) -> UserSummary {
    UserSummary {
        username: username.to_owned(),
        limit: credential.quota,
        limit_display: credential.quota.to_string(),
    }
}

fn summaries(users: &Users) -> Vec<UserSummary> {
    users.iter().map(|(name, credential)| summary(name, credential)).collect()
}

async fn load(path: PathBuf) -> Result<Users> {
    tokio::task::spawn_blocking(move || {
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "credential file not found, starting empty");
                return Ok(Users::new());
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut users = Users::new();
        for (index, line) in raw.lines().enumerate() {
            match record::parse_line(index + 1, line) {
                Ok(Some((username, credential))) => {
                    users.insert(username, credential);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping credential line"),
            }
        }
        Ok(users)
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

async fn persist(path: PathBuf, users: &Users) -> Result<()> {
    let contents: String = users
        .iter()
        .map(|(name, credential)| record::format_line(name, credential))
        .collect();

    tokio::task::spawn_blocking(move || {
        write_atomic(&path, &contents).map_err(|source| StoreError::Io { path, source })
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Write to a temp file beside `path`, then rename over it
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
