//! Contact handlers
//!
//! Requests and approvals are negotiated upstream; these routes record the
//! accepted outcome and tell the other side over its live connections.

use super::{caller, internal, ErrorResponse, HandlerError};
use crate::config::AppState;
use crate::models::{FriendRequestNotice, ServerEvent};
use crate::store::IdentityStore;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// PUT /friends/{user_id} - Record an accepted friendship
pub async fn add_friend(
    Path(other_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, HandlerError> {
    let user_id = caller(&headers)?;

    let me = state.users.find_user_by_id(&user_id).await.map_err(internal)?;
    let other = state.users.find_user_by_id(&other_id).await.map_err(internal)?;
    let (Some(me), Some(_)) = (me, other) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "User not found".to_string(),
            }),
        ));
    };

    if let Err(e) = state.friends.add_friendship(&me.id, &other_id).await {
        warn!("Failed to add friend: {}", e);
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        ));
    }

    let notice = FriendRequestNotice {
        request_id: Uuid::new_v4().to_string(),
        from_user_id: me.id.clone(),
        from_username: me.username.clone(),
        message: None,
        created_at: Utc::now(),
    };
    let pushed = state
        .hub
        .deliver(&other_id, &ServerEvent::FriendRequestAccepted(notice));
    info!(
        "Friendship {} <-> {} recorded ({} push(es))",
        me.username, other_id, pushed
    );

    Ok(StatusCode::CREATED)
}

/// DELETE /friends/{user_id}
pub async fn remove_friend(
    Path(other_id): Path<String>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<StatusCode, HandlerError> {
    let user_id = caller(&headers)?;
    state
        .friends
        .remove_friendship(&user_id, &other_id)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /friends - Caller's friend ids
pub async fn list_friends(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, HandlerError> {
    let user_id = caller(&headers)?;
    let ids = state
        .friends
        .list_friend_ids(&user_id)
        .await
        .map_err(internal)?;
    Ok(Json(ids))
}
