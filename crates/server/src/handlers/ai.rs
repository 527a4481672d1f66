use super::{internal, ErrorResponse, HandlerError};
use crate::config::AppState;
use crate::users::UserInfo;
use axum::{extract::State, http::StatusCode, Json};

/// GET /ai/bot - The assistant account, so clients can address it
pub async fn get_bot(State(state): State<AppState>) -> Result<Json<UserInfo>, HandlerError> {
    match state.users.find_by_username(&state.bot_name).await {
        Ok(Some(bot)) => Ok(Json(bot)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Assistant account not found".to_string(),
            }),
        )),
        Err(e) => Err(internal(e)),
    }
}
