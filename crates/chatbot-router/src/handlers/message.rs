use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;

use crate::models::chat::{MessageRequest, MessageResponse};
use crate::state::AppState;
use crate::utils::error::ApiError;

pub async fn message_handler(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let content = request
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message content is required".to_string()))?;

    let session_id = request.session_id.filter(|s| !s.trim().is_empty());
    let clear_history = request.clear_history.unwrap_or(false);

    info!(
        "Message request: session={:?}, message_len={}, clear_history={}",
        session_id,
        content.len(),
        clear_history
    );

    let outcome = state
        .router
        .route_with(&content, session_id.as_deref(), clear_history)
        .await;

    Ok(Json(MessageResponse {
        bot_reply: outcome.reply,
    }))
}
