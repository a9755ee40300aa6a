//! Generative fallback client
//!
//! - Ordered call strategies against the Gemini API, first success wins
//! - Ordered text extractors over the raw JSON response
//! - Failures are logged and reported as "no answer"

pub mod extractors;
pub mod gemini;
pub mod strategies;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::ConversationTurn;

pub use extractors::{default_extractors, extract_text, TextExtractor};
pub use gemini::GeminiClient;
pub use strategies::{default_strategies, CallStrategy, GeminiTransport};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Empty reply")]
    EmptyReply,

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

/// What gets sent to the model
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// A single message with no session context
    Message(String),
    /// Prior turns followed by the current user turn
    Conversation(Vec<ConversationTurn>),
}

impl Prompt {
    /// Turns to send, a bare message becomes one user turn
    pub fn turns(&self) -> Vec<ConversationTurn> {
        match self {
            Prompt::Message(text) => vec![ConversationTurn::user(text.clone())],
            Prompt::Conversation(turns) => turns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Failure(String),
}

/// Diagnostic record of one strategy attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCallAttempt {
    pub strategy_name: &'static str,
    pub outcome: AttemptOutcome,
}

/// Anything that can produce a reply for a prompt.
/// `None` means every attempt failed; errors never escape.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Option<String>;
}
