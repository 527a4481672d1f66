use crate::config::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsers {
    pub online_user_ids: Vec<String>,
}

/// GET /users/online
pub async fn list_online(State(state): State<AppState>) -> Json<OnlineUsers> {
    Json(OnlineUsers {
        online_user_ids: state.hub.online_user_ids().into_iter().collect(),
    })
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK - Chatter Server"
}
