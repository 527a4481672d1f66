use super::caller;
use crate::config::AppState;
use crate::models::{MessageEvent, SendMessageInput, StoredMessage};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

/// PUT /messages/{recipient_id}
pub async fn send_message(
    Path(recipient_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(input): Json<SendMessageInput>,
) -> Result<(StatusCode, Json<MessageEvent>), Response> {
    let sender = caller(&headers).map_err(IntoResponse::into_response)?;
    info!("PUT /messages/{} from {}", recipient_id, sender);

    let event = state
        .pipeline
        .send_message(&sender, &recipient_id, input.into())
        .await
        .map_err(IntoResponse::into_response)?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /messages/{peer_id}
pub async fn get_history(
    Path(peer_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredMessage>>, Response> {
    let user = caller(&headers).map_err(IntoResponse::into_response)?;
    info!("GET /messages/{} for {}", peer_id, user);

    let history = state
        .pipeline
        .history(&user, &peer_id)
        .await
        .map_err(IntoResponse::into_response)?;

    Ok(Json(history))
}
