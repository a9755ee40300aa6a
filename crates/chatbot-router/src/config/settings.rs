use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Gemini API key is missing (set GEMINI_API_KEY or APP_LLM__API_KEY)")]
    MissingCredential,

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub intents: IntentsConfig,
    pub matcher: MatcherConfig,
    pub classifier: ClassifierConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntentsConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatcherConfig {
    /// Minimum Jaccard score for a canned answer
    pub threshold: f32,
    /// Accept any token overlap before calling the model
    pub permissive_fallback: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub model_path: Option<String>,
    pub confidence_floor: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Per-request HTTP timeout
    pub timeout_seconds: u64,
    /// Upper bound for the whole strategy cascade
    pub total_timeout_seconds: u64,
    #[serde(default)]
    pub system_prompt_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    /// Turns kept per session (user and assistant count separately)
    pub max_turns: usize,
    /// Turns sent to the model as context
    pub context_turns: usize,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are the virtual assistant of a university department. \
Answer questions about its programs, staff, courses and student life clearly and concisely. \
If you are unsure, advise the student to confirm with the department office.";

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("intents.path", "data/intents.json")?
            .set_default("matcher.threshold", 0.85)?
            .set_default("matcher.permissive_fallback", true)?
            .set_default("classifier.confidence_floor", 0.65)?
            .set_default("llm.api_key", "")?
            .set_default("llm.base_url", "https://generativelanguage.googleapis.com/v1beta")?
            .set_default("llm.model", "gemini-1.5-flash-8b")?
            .set_default("llm.max_output_tokens", 1200_i64)?
            .set_default("llm.temperature", 0.95)?
            .set_default("llm.top_p", 0.85)?
            .set_default("llm.timeout_seconds", 30_i64)?
            .set_default("llm.total_timeout_seconds", 60_i64)?
            .set_default("conversation.max_turns", 10_i64)?
            .set_default("conversation.context_turns", 10_i64)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        // Plain variables used by common hosting setups
        if settings.llm.api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                settings.llm.api_key = key;
            }
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            settings.server.port = port;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the server must not start with
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(SettingsError::MissingCredential);
        }
        if !(0.0..=1.0).contains(&self.matcher.threshold) {
            return Err(SettingsError::Invalid {
                key: "matcher.threshold",
                reason: format!("{} is outside [0, 1]", self.matcher.threshold),
            });
        }
        if !(0.0..=1.0).contains(&self.classifier.confidence_floor) {
            return Err(SettingsError::Invalid {
                key: "classifier.confidence_floor",
                reason: format!("{} is outside [0, 1]", self.classifier.confidence_floor),
            });
        }
        if self.llm.max_output_tokens == 0 {
            return Err(SettingsError::Invalid {
                key: "llm.max_output_tokens",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn intents_path(&self) -> PathBuf {
        PathBuf::from(&self.intents.path)
    }

    pub fn classifier_path(&self) -> Option<PathBuf> {
        self.classifier.model_path.as_ref().map(PathBuf::from)
    }

    /// System instruction for the model, from file when configured
    pub fn system_prompt(&self) -> Result<String> {
        match &self.llm.system_prompt_path {
            Some(path) => std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .with_context(|| format!("Failed to read system prompt from {}", path)),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}
