use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_store::{ErrorKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("File not found: {0}")]
    BlobNotFound(String),

    #[error("File too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("Upload ticket is invalid or has expired")]
    UploadTicketInvalid,

    /// Object storage failed underneath us.
    #[error("Object storage error: {0}")]
    Upstream(String),

    /// The URL names nothing that can exist, e.g. an id that is not a UUID.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status and stable machine-readable code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Store(err) => match err.kind() {
                ErrorKind::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
                ErrorKind::ProfileNotSynced => (StatusCode::FORBIDDEN, "profile_not_synced"),
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_failed"),
                ErrorKind::NotOwner => (StatusCode::FORBIDDEN, "not_owner"),
                ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            ServerError::BlobNotFound(_) | ServerError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ServerError::BlobTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ServerError::UploadTicketInvalid => (StatusCode::FORBIDDEN, "upload_ticket_invalid"),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServerError {
    fn from(rejection: PathRejection) -> Self {
        ServerError::NotFound(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match code {
            "internal" => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            "upstream_failure" => {
                tracing::warn!(error = %self, "object storage failure");
                "Object storage unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
