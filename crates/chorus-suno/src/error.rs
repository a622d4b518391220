use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors from the remote music generation service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network or connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The service rejected the session cookie
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Service returned a non-success status
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A clip finished in the error state
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Track has no audio yet
    #[error("Track {0} has no audio URL")]
    MissingAudio(String),

    /// Writing the downloaded audio failed
    #[error("Download failed: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
