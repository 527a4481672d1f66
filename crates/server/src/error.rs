use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the synchronous send path. Each aborts before any side effect
/// that a later gate guards.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("you can only send messages to friends")]
    Forbidden,

    #[error("message contains inappropriate language")]
    ContentRejected,

    #[error("failed to store message: {0}")]
    PersistenceFailure(String),
}

pub type Result<T> = core::result::Result<T, SendError>;

impl SendError {
    pub fn status(&self) -> StatusCode {
        match self {
            SendError::NotFound(_) => StatusCode::NOT_FOUND,
            SendError::Forbidden => StatusCode::FORBIDDEN,
            SendError::ContentRejected => StatusCode::UNPROCESSABLE_ENTITY,
            SendError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            // Storage details stay in the logs
            SendError::PersistenceFailure(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

/// Failure inside a detached responder task. Only ever logged.
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("lookup failed: {0}")]
    Lookup(anyhow::Error),

    #[error("generation failed: {0}")]
    Generation(anyhow::Error),

    #[error("failed to store reply: {0}")]
    Persistence(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SendError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(SendError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            SendError::ContentRejected.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            SendError::PersistenceFailure("disk".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
