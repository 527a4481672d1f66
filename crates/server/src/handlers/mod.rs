//! HTTP and websocket handlers

pub mod ai;
pub mod friends;
pub mod messages;
pub mod presence;
pub mod ws;

pub use crate::config::AppState;

pub use ai::get_bot;
pub use friends::{add_friend, list_friends, remove_friend};
pub use messages::{get_history, send_message};
pub use presence::{health_check, list_online};
pub use ws::ws_upgrade;

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Caller identity from the `x-user` header, set by the auth layer in front
/// of this server.
pub(crate) fn caller(headers: &HeaderMap) -> Result<String, HandlerError> {
    headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing x-user header".to_string(),
                }),
            )
        })
}

pub(crate) fn internal(e: impl std::fmt::Display) -> HandlerError {
    tracing::error!("[Gateway] {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error".to_string(),
        }),
    )
}
