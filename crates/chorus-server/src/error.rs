use axum::Json;
use axum::response::{IntoResponse, Response};
use chorus_store::StoreError;
use chorus_suno::RemoteError;
use http::StatusCode;
use serde::Serialize;

/// Errors returned by the admin panel and HTTP generation API
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("generation did not finish in time")]
    TimedOut,

    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdminError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_)
            | Self::Store(StoreError::InvalidUsername(_) | StoreError::EmptyPassword | StoreError::InvalidLimit(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) | Self::Store(StoreError::UnknownUser(_)) => StatusCode::NOT_FOUND,
            Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            Self::Store(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self.status_code().as_u16() {
            401 => "authentication_error",
            400 => "invalid_request_error",
            404 => "not_found_error",
            502 | 504 => "api_error",
            _ => "internal_error",
        }
    }

    /// Message that is safe to expose to API consumers
    pub fn client_message(&self) -> String {
        match self {
            Self::Io(_) | Self::Store(StoreError::Io { .. } | StoreError::Task(_)) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: &'static str,
    code: u16,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                message: self.client_message(),
                r#type: self.error_type(),
                code: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        assert_eq!(AdminError::from(StoreError::UnknownUser("bob".to_string())).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AdminError::from(StoreError::InvalidLimit(-5)).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AdminError::from(StoreError::EmptyPassword).error_type(), "invalid_request_error");
    }

    #[test]
    fn io_details_are_hidden() {
        let err = AdminError::from(std::io::Error::other("/secret/path unreadable"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn remote_errors_are_bad_gateway() {
        let err = AdminError::from(RemoteError::GenerationFailed("clip x failed".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.client_message().contains("clip x failed"));
    }
}
