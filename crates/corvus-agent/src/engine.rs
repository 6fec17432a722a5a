use std::time::Duration;

use async_trait::async_trait;
use corvus_core::{CorvusError, EngineConfig};
use serde::{Deserialize, Serialize};

/// A message in the running conversation with the reasoning engine.
///
/// # Examples
///
/// ```
/// use corvus_agent::engine::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this pull request");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
    /// Tool name, present only on tool-result messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// System-level instructions.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// User input.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    /// Assistant (engine) output.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// A tool-result message carrying the serialized outcome envelope.
    pub fn tool(name: &str, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: Some(name.to_string()),
        }
    }
}

/// Role in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Engine response.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// One tool invocation requested by the engine.
///
/// This is the single internal shape every wire format is normalized into
/// before the loop controller sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Registered tool name.
    pub name: String,
    /// JSON arguments for the tool.
    pub arguments: serde_json::Value,
}

/// The engine's reply for one iteration.
#[derive(Debug, Clone, Default)]
pub struct EngineReply {
    /// Free-text reasoning. May be empty when the engine only calls tools.
    pub thought: String,
    /// Requested tool invocations, in request order.
    pub tool_calls: Vec<ToolCall>,
}

/// Context handed to the summarizer at finalization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryContext {
    /// Pull request title.
    pub title: String,
    /// Pull request description.
    pub description: String,
    /// Number of changed files.
    pub files_changed: usize,
    /// Findings recorded so far.
    pub total_issues: usize,
    /// Suggestions recorded so far.
    pub total_suggestions: usize,
}

/// Pluggable text-completion-with-function-calling backend.
///
/// `complete` is the loop's sole suspension point that may block on the
/// network; `summarize` is consulted once at finalization and its failure is
/// non-fatal (the controller falls back to a templated synopsis).
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Run one completion over the full transcript with the tool catalog
    /// bound. Pass an empty catalog for the reduced retry without tools.
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        tool_schemas: &[serde_json::Value],
    ) -> Result<EngineReply, CorvusError>;

    /// Generate a natural-language synopsis of the finished review.
    async fn summarize(&self, context: &SummaryContext) -> Result<String, CorvusError>;
}

/// OpenAI-compatible chat completions engine.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Ollama, vLLM, LiteLLM, etc. Both the current `tool_calls` and the
/// legacy `function_call` response shapes are normalized into [`ToolCall`].
///
/// # Examples
///
/// ```
/// use corvus_core::EngineConfig;
/// use corvus_agent::engine::OpenAiEngine;
///
/// let config = EngineConfig {
///     api_key: Some("test-key".into()),
///     ..EngineConfig::default()
/// };
/// let engine = OpenAiEngine::new(&config).unwrap();
/// ```
#[derive(Clone)]
pub struct OpenAiEngine {
    client: reqwest::Client,
    config: EngineConfig,
}

impl OpenAiEngine {
    /// Create a new engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CorvusError::Engine`] if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, CorvusError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| CorvusError::Engine(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, body: serde_json::Value) -> Result<serde_json::Value, CorvusError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com");
        let url = format!("{base_url}/v1/chat/completions");

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }
        request = request.header("Content-Type", "application/json");

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| CorvusError::Engine(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CorvusError::Engine(format!(
                "engine API error {status}: {body_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CorvusError::Engine(format!("failed to parse response: {e}")))
    }

    /// Send a single user prompt and return the text of the reply.
    ///
    /// Used by the file-analysis delegate and the summarizer, which do not
    /// need tool binding.
    pub async fn prompt(&self, content: &str) -> Result<String, CorvusError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [ChatMessage::user(content)],
            "temperature": self.config.temperature,
        });
        let response = self.chat(body).await?;
        let text = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                CorvusError::Engine(format!("unexpected response structure: {response}"))
            })?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn complete(
        &self,
        transcript: &[ChatMessage],
        tool_schemas: &[serde_json::Value],
    ) -> Result<EngineReply, CorvusError> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": transcript,
            "temperature": self.config.temperature,
        });
        if !tool_schemas.is_empty() {
            body["tools"] = serde_json::Value::Array(tool_schemas.to_vec());
        }

        let response = self.chat(body).await?;
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| {
                CorvusError::Engine(format!("unexpected response structure: {response}"))
            })?;

        let thought = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(EngineReply {
            thought,
            tool_calls: normalize_tool_calls(message),
        })
    }

    async fn summarize(&self, context: &SummaryContext) -> Result<String, CorvusError> {
        let prompt = crate::prompt::build_summary_prompt(context);
        self.prompt(&prompt).await
    }
}

/// Normalize an assistant message's tool requests into [`ToolCall`] values.
///
/// Accepts the current `tool_calls` array (nested `function` objects with
/// string-encoded arguments) and the legacy `function_call` object. String
/// arguments that fail to parse as JSON degrade to `{}` rather than dropping
/// the call.
pub fn normalize_tool_calls(message: &serde_json::Value) -> Vec<ToolCall> {
    let mut calls = Vec::new();

    let entries: Vec<&serde_json::Value> = match message.get("tool_calls").and_then(|t| t.as_array())
    {
        Some(array) => array.iter().collect(),
        None => message
            .get("function_call")
            .filter(|f| f.is_object())
            .into_iter()
            .collect(),
    };

    for entry in entries {
        let function = entry.get("function").unwrap_or(entry);
        let Some(name) = function.get("name").and_then(|n| n.as_str()) else {
            continue;
        };

        let arguments = match function.get("arguments") {
            Some(serde_json::Value::String(raw)) => {
                serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({}))
            }
            Some(value) if value.is_object() => value.clone(),
            _ => serde_json::json!({}),
        };

        calls.push(ToolCall {
            name: name.to_string(),
            arguments,
        });
    }

    calls
}
