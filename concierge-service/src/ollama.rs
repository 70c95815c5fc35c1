use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::OllamaConfig;
use crate::error::{OllamaError, ServiceError, ServiceResult};
use crate::tools::OllamaToolDefinition;

/// Text/tool generation capability used by the orchestrator.
///
/// One call = one complete model reply. Implemented by [`OllamaClient`]; tests
/// substitute a scripted model.
pub trait ChatModel: Send + Sync + 'static {
    fn chat(&self, request: ChatRequest) -> impl Future<Output = ServiceResult<ModelReply>> + Send;

    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

/// A single generation request
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call; empty disables tool calling
    pub tools: Vec<OllamaToolDefinition>,
}

/// What the model produced: text, tool calls, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<OllamaToolCall>,
}

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::Ollama(OllamaError::Connection {
                    url: config.base_url.clone(),
                    source: e,
                })
            })?;

        Ok(Self { client, config })
    }

    async fn check_tags(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(error = %e, "Ollama health check failed");
                false
            }
        }
    }

    async fn send_chat(&self, request: ChatRequest) -> ServiceResult<ModelReply> {
        let url = format!("{}/api/chat", self.config.base_url);

        let body = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: request.messages,
            tools: request.tools,
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
            }),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OllamaError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();

            if message.contains("model") && message.contains("not found") {
                return Err(ServiceError::Ollama(OllamaError::ModelNotFound {
                    model: self.config.model.clone(),
                }));
            }

            return Err(ServiceError::Ollama(OllamaError::Generation {
                status,
                message,
            }));
        }

        let text = response.text().await.map_err(|e| OllamaError::Connection {
            url: url.clone(),
            source: e,
        })?;
        let chat_response: OllamaChatResponse =
            serde_json::from_str(&text).map_err(|e| OllamaError::InvalidResponse { source: e })?;

        metrics::histogram!("concierge_model_seconds").record(started.elapsed().as_secs_f64());
        debug!(
            model = %self.config.model,
            prompt_tokens = ?chat_response.prompt_eval_count,
            completion_tokens = ?chat_response.eval_count,
            tool_call_count = chat_response.message.tool_calls.len(),
            content_length = chat_response.message.content.len(),
            "LLM response complete"
        );

        Ok(ModelReply {
            content: chat_response.message.content,
            tool_calls: chat_response.message.tool_calls,
        })
    }
}

impl ChatModel for OllamaClient {
    fn chat(&self, request: ChatRequest) -> impl Future<Output = ServiceResult<ModelReply>> + Send {
        self.send_chat(request)
    }

    fn health_check(&self) -> impl Future<Output = bool> + Send {
        self.check_tags()
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }
}

/// Tool call as emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

// Internal Ollama API types

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaToolDefinition>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call_response() {
        let body = r#"{
            "model": "qwen2.5:14b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "product-details", "arguments": {"product_id": 3}}}
                ]
            },
            "done": true,
            "prompt_eval_count": 812,
            "eval_count": 21
        }"#;

        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "");
        assert_eq!(parsed.message.tool_calls.len(), 1);
        assert_eq!(parsed.message.tool_calls[0].function.name, "product-details");
        assert_eq!(
            parsed.message.tool_calls[0].function.arguments["product_id"],
            3
        );
        assert_eq!(parsed.eval_count, Some(21));
    }

    #[test]
    fn test_parse_text_response() {
        let body = r#"{"message": {"role": "assistant", "content": "Hello!"}, "done": true}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "Hello!");
        assert!(parsed.message.tool_calls.is_empty());
    }

    #[test]
    fn test_request_omits_empty_tools() {
        let body = OllamaChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
            stream: false,
            options: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["messages"][0].get("tool_calls").is_none());
    }
}
