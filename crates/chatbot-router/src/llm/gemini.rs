use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::extractors::{default_extractors, extract_text, TextExtractor};
use super::strategies::{default_strategies, CallStrategy, GeminiTransport};
use super::{AttemptOutcome, GenerativeBackend, LlmError, ModelCallAttempt, Prompt};
use crate::config::LlmConfig;

/// Gemini client with ordered fallbacks over call conventions
pub struct GeminiClient {
    transport: GeminiTransport,
    strategies: Vec<Box<dyn CallStrategy>>,
    extractors: Vec<Box<dyn TextExtractor>>,
    total_timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, system_prompt: String) -> Self {
        info!(
            "Gemini client ready (model={}, max_output_tokens={})",
            config.model, config.max_output_tokens
        );
        Self {
            transport: GeminiTransport::new(config, system_prompt),
            strategies: default_strategies(),
            extractors: default_extractors(),
            total_timeout: Duration::from_secs(config.total_timeout_seconds.max(1)),
        }
    }

    /// Replace the strategy list, mainly for narrowing in tests
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn CallStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Try every strategy in order and keep the attempt trail
    pub async fn generate_traced(&self, prompt: &Prompt) -> (Option<String>, Vec<ModelCallAttempt>) {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let result = strategy
                .call(&self.transport, prompt)
                .await
                .and_then(|raw| {
                    let text = extract_text(&self.extractors, &raw);
                    if text.trim().is_empty() {
                        Err(LlmError::EmptyReply)
                    } else {
                        Ok(text)
                    }
                });

            match result {
                Ok(text) => {
                    debug!("Strategy {} succeeded ({} chars)", strategy.name(), text.len());
                    attempts.push(ModelCallAttempt {
                        strategy_name: strategy.name(),
                        outcome: AttemptOutcome::Success,
                    });
                    return (Some(text), attempts);
                }
                Err(e) => {
                    warn!("Strategy {} failed: {}", strategy.name(), e);
                    attempts.push(ModelCallAttempt {
                        strategy_name: strategy.name(),
                        outcome: AttemptOutcome::Failure(e.to_string()),
                    });
                }
            }
        }

        (None, attempts)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Option<String> {
        match tokio::time::timeout(self.total_timeout, self.generate_traced(prompt)).await {
            Ok((text, attempts)) => {
                if text.is_none() {
                    warn!(
                        "All {} generation strategies failed for model {}",
                        attempts.len(),
                        self.transport.model()
                    );
                }
                text
            }
            Err(_) => {
                warn!(
                    "Generation timed out after {}s",
                    self.total_timeout.as_secs()
                );
                None
            }
        }
    }
}
