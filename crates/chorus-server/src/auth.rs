use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chorus_store::PasswordHash;

use crate::error::AdminError;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `header` does not carry the expected secret
///
/// The comparison runs on SHA-256 digests in constant time.
pub async fn require_secret(header: &'static str, expected: PasswordHash, req: Request, next: Next) -> Response {
    let provided = req.headers().get(header).and_then(|v| v.to_str().ok());

    match provided {
        Some(value) if expected.verify(value) => next.run(req).await,
        _ => {
            tracing::debug!(header, path = %req.uri().path(), "rejected request without valid secret");
            AdminError::Unauthorized.into_response()
        }
    }
}
