use serde::{Deserialize, Serialize};

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub clear_history: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddIntentRequest {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub bot_reply: String,
}

#[derive(Debug, Serialize)]
pub struct AddIntentResponse {
    pub success: bool,
    pub message: String,
}
