//! Generation backends.
//!
//! The backend is a strategy chosen once at construction from configuration
//! and injected into the orchestrator; nothing re-selects per call. Both
//! clients enforce the configured request timeout and surface elapsing as a
//! typed failure.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use lectern_core::config::{GenerationBackend, GenerationSettings};
use lectern_core::error::LecternError;
use lectern_core::traits::Generator;
use lectern_core::types::{Message, Role};

/// Build the configured generation backend.
pub fn build_generator(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    match settings.backend {
        GenerationBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(settings)?)),
        GenerationBackend::OpenAi => Ok(Arc::new(OpenAiChatGenerator::new(settings)?)),
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow!("failed to build HTTP client: {e}"))
}

fn classify(err: reqwest::Error, timeout: Duration) -> anyhow::Error {
    if err.is_timeout() {
        anyhow!(LecternError::Timeout(timeout))
    } else {
        anyhow!(LecternError::Generation(err.to_string()))
    }
}

/// Flatten chat messages into the single-prompt format Ollama's generate
/// endpoint expects.
fn flatten_messages(messages: &[Message]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(messages.len() + 1);
    for message in messages {
        let prefix = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        parts.push(format!("{prefix}: {}\n", message.content));
    }
    parts.push("Assistant: ".to_string());
    parts.join("\n")
}

pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let timeout = settings.timeout();
        Ok(Self {
            http: http_client(timeout)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": flatten_messages(messages),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(LecternError::Generation(format!(
                "ollama returned status {status}"
            ))));
        }
        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| anyhow!(LecternError::Generation(format!("bad response body: {e}"))))?;
        if parsed.response.trim().is_empty() {
            return Err(anyhow!(LecternError::Generation("empty completion".to_string())));
        }
        Ok(parsed.response)
    }

    fn backend_info(&self) -> String {
        format!("ollama ({})", self.model)
    }
}

pub struct OpenAiChatGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiChatGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                anyhow!(LecternError::InvalidConfig(
                    "generation.backend = \"openai\" requires generation.api_key or OPENAI_API_KEY"
                        .to_string()
                ))
            })?;
        let timeout = settings.timeout();
        Ok(Self {
            http: http_client(timeout)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAiChatGenerator {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(LecternError::Generation(format!(
                "chat completions returned status {status}"
            ))));
        }
        let parsed: ChatCompletion = response
            .json()
            .await
            .map_err(|e| anyhow!(LecternError::Generation(format!("bad response body: {e}"))))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!(LecternError::Generation("empty completion".to_string())))
    }

    fn backend_info(&self) -> String {
        format!("openai ({})", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_flatten_in_conversation_order() {
        let prompt = flatten_messages(&[
            Message::system("be brief"),
            Message::user("what is a cell?"),
        ]);
        assert!(prompt.starts_with("System: be brief"));
        assert!(prompt.contains("User: what is a cell?"));
        assert!(prompt.ends_with("Assistant: "));
    }
}
