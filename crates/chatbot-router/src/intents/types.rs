use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tag of the last-resort intent. It never takes part in matching.
pub const DEFAULT_TAG: &str = "default";

/// A named cluster of trigger phrases mapped to canned responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub responses: Vec<String>,
}

impl Intent {
    pub fn new(
        tag: impl Into<String>,
        patterns: Vec<String>,
        responses: Vec<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            patterns,
            responses,
        }
    }

    pub fn is_default(&self) -> bool {
        self.tag == DEFAULT_TAG
    }

    /// Uniformly random response, `None` when the intent has none.
    pub fn pick_response<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.responses.choose(rng).cloned()
    }
}

/// On-disk layout of the intent store: `{"intents": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentFile {
    #[serde(default)]
    pub intents: Vec<Intent>,
}

impl IntentFile {
    pub fn find(&self, tag: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.tag == tag)
    }

    pub fn default_intent(&self) -> Option<&Intent> {
        self.find(DEFAULT_TAG)
    }

    /// Intents that take part in matching (everything but `default`).
    pub fn active(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter().filter(|intent| !intent.is_default())
    }
}
