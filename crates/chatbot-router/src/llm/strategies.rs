use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{LlmError, Prompt};
use crate::config::LlmConfig;
use crate::conversation::{ConversationTurn, Role};

/// Connection details shared by every call strategy
#[derive(Clone)]
pub struct GeminiTransport {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    timeout_seconds: u64,
}

impl GeminiTransport {
    pub fn new(config: &LlmConfig, system_prompt: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            timeout_seconds: config.timeout_seconds,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn openai_chat_url(&self) -> String {
        format!("{}/openai/chat/completions", self.base_url)
    }

    fn generation_config(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "topP": self.top_p,
            "maxOutputTokens": self.max_output_tokens,
        })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<Value, LlmError> {
        let response = request
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_seconds)
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// "User: ...\nAssistant: ..." transcript for single-turn conventions
fn flatten_turns(turns: &[ConversationTurn]) -> String {
    if let [only] = turns {
        return only.text.clone();
    }

    turns
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One request convention against the model API
#[async_trait]
pub trait CallStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, transport: &GeminiTransport, prompt: &Prompt) -> Result<Value, LlmError>;
}

/// Native `generateContent` with a system instruction and multi-turn contents
pub struct NativeChat;

/// Native `generateContent` with everything folded into one user turn
pub struct NativeSingleTurn;

/// OpenAI-compatible chat completions endpoint
pub struct OpenAiCompat;

#[async_trait]
impl CallStrategy for NativeChat {
    fn name(&self) -> &'static str {
        "native_chat"
    }

    async fn call(&self, transport: &GeminiTransport, prompt: &Prompt) -> Result<Value, LlmError> {
        let contents: Vec<Value> = prompt
            .turns()
            .iter()
            .map(|turn| {
                json!({
                    "role": gemini_role(turn.role),
                    "parts": [{"text": turn.text}],
                })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": transport.generation_config(),
        });
        if !transport.system_prompt.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": transport.system_prompt}]});
        }

        let request = transport
            .client
            .post(transport.generate_content_url())
            .header("x-goog-api-key", &transport.api_key);

        transport.post_json(request, &body).await
    }
}

#[async_trait]
impl CallStrategy for NativeSingleTurn {
    fn name(&self) -> &'static str {
        "native_single_turn"
    }

    async fn call(&self, transport: &GeminiTransport, prompt: &Prompt) -> Result<Value, LlmError> {
        let transcript = flatten_turns(&prompt.turns());
        let text = if transport.system_prompt.is_empty() {
            transcript
        } else {
            format!("{}\n\n{}", transport.system_prompt, transcript)
        };

        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": text}]}],
            "generationConfig": transport.generation_config(),
        });

        let request = transport
            .client
            .post(transport.generate_content_url())
            .header("x-goog-api-key", &transport.api_key);

        transport.post_json(request, &body).await
    }
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[async_trait]
impl CallStrategy for OpenAiCompat {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn call(&self, transport: &GeminiTransport, prompt: &Prompt) -> Result<Value, LlmError> {
        let turns = prompt.turns();

        let mut messages = Vec::with_capacity(turns.len() + 1);
        if !transport.system_prompt.is_empty() {
            messages.push(OpenAiMessage {
                role: "system",
                content: &transport.system_prompt,
            });
        }
        messages.extend(turns.iter().map(|turn| OpenAiMessage {
            role: turn.role.as_str(),
            content: &turn.text,
        }));

        let body = OpenAiChatRequest {
            model: &transport.model,
            messages,
            max_tokens: transport.max_output_tokens,
            temperature: transport.temperature,
            top_p: transport.top_p,
            stream: false,
        };

        let request = transport
            .client
            .post(transport.openai_chat_url())
            .header("Authorization", format!("Bearer {}", transport.api_key));

        transport.post_json(request, &body).await
    }
}

/// Strategies in the order they are tried
pub fn default_strategies() -> Vec<Box<dyn CallStrategy>> {
    vec![
        Box::new(NativeChat),
        Box::new(NativeSingleTurn),
        Box::new(OpenAiCompat),
    ]
}
