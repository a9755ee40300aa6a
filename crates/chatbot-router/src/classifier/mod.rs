//! Optional local intent classifier
//!
//! Enabled only when a model artifact is present at startup.

mod bag_of_words;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use bag_of_words::BagOfWordsClassifier;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model shape mismatch: {0}")]
    Shape(String),
}

/// Predicted tag with its probability
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tag: String,
    pub confidence: f32,
}

pub trait IntentClassifier: Send + Sync {
    /// Arg-max tag for the message tokens, `None` if the model cannot answer
    fn classify(&self, tokens: &HashSet<String>) -> Option<Classification>;
}

/// Resolve classifier availability once.
/// A missing or broken artifact disables the stage instead of failing startup.
pub async fn load_optional(path: Option<&Path>) -> Option<Arc<dyn IntentClassifier>> {
    let path = match path {
        Some(path) => path,
        None => {
            info!("No classifier model configured, statistical stage disabled");
            return None;
        }
    };

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(
            "Classifier model {} not found, statistical stage disabled",
            path.display()
        );
        return None;
    }

    match BagOfWordsClassifier::load(path).await {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            warn!("Classifier disabled: {}", e);
            None
        }
    }
}
