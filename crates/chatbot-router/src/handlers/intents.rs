use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::intents::{Intent, IntentStore};
use crate::models::chat::{AddIntentRequest, AddIntentResponse};
use crate::utils::error::ApiError;

pub async fn add_intent_handler(
    State(store): State<Arc<IntentStore>>,
    payload: Result<Json<AddIntentRequest>, JsonRejection>,
) -> Result<Json<AddIntentResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let tag = request
        .tag
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let (tag, patterns, responses) = match tag {
        Some(tag) if !request.patterns.is_empty() && !request.responses.is_empty() => {
            (tag, request.patterns, request.responses)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Tag, patterns, and responses are required".to_string(),
            ))
        }
    };

    store
        .add_intent(Intent::new(tag.clone(), patterns, responses))
        .await?;

    Ok(Json(AddIntentResponse {
        success: true,
        message: format!("Intent '{}' added successfully.", tag),
    }))
}
