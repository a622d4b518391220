use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Credential store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or rewriting the backing file failed
    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the backing file does not have the `username:password:limit` shape
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// Username is empty or contains a delimiter
    #[error("invalid username '{0}'")]
    InvalidUsername(String),

    /// Password is empty
    #[error("password must not be empty")]
    EmptyPassword,

    /// Usage limit below -1
    #[error("invalid usage limit {0}, expected -1 or a non-negative count")]
    InvalidLimit(i64),

    /// No record for this username
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// The blocking file task was cancelled or panicked
    #[error("credential file task failed: {0}")]
    Task(String),
}
