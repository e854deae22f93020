//! Chat-completion API types and client.
//!
//! Speaks the OpenAI-compatible `POST {base_url}/chat/completions` format
//! with function tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::config::PlannerConfig;
use shared::PlanError;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// An assistant turn that only requests tool calls
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// The result of one tool call, answering the call with `call_id`
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool call issued by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCallRequest {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus JSON-encoded arguments, exactly as the model sent them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A callable function declared to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

impl FunctionTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Body of a chat-completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Anything that can answer a chat-completion request
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request and return the model's reply message.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, PlanError>;
}

/// HTTP client for an OpenAI-compatible chat-completion API
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatClient {
    /// Create a client; fails with [`PlanError::MissingApiKey`] when no key is set.
    pub fn new(config: &PlannerConfig) -> Result<Self, PlanError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(PlanError::MissingApiKey)?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PlanError::external)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatMessage, PlanError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(PlanError::external)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, error = %body, "Chat completion failed");
            return Err(PlanError::ExternalCall(format!(
                "chat completion returned {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = response.json().await.map_err(PlanError::external)?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PlanError::ExternalCall("chat completion returned no choices".to_string()))?;

        debug!(finish_reason = ?choice.finish_reason, tool_calls = choice.message.tool_calls.len(), "Chat completion received");
        Ok(choice.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base_url
    }

    fn config(base_url: &str, api_key: Option<&str>) -> PlannerConfig {
        PlannerConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_api_key() {
        for key in [None, Some(""), Some("   ")] {
            let err = OpenAiChatClient::new(&config("http://unused", key)).unwrap_err();
            assert!(matches!(err, PlanError::MissingApiKey));
        }
    }

    #[test]
    fn test_message_wire_shape() {
        let message = ChatMessage::tool_result("call_1", "true");
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "tool", "content": "true", "tool_call_id": "call_1"})
        );

        let parsed: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "verify_movie", "arguments": "{\"name\":\"Inception\"}"}
            }]
        }))
        .unwrap();
        assert_eq!(parsed.tool_calls[0].function.name, "verify_movie");
        assert!(parsed.content.is_none());
    }

    #[tokio::test]
    async fn test_complete_sends_bearer_and_parses_reply() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "gpt-4o-mini");
                Json(json!({
                    "choices": [{
                        "message": {"role": "assistant", "content": "{\"episodes\": []}"},
                        "finish_reason": "stop"
                    }]
                }))
            }),
        );
        let base_url = serve(app).await;
        let client = OpenAiChatClient::new(&config(&base_url, Some("sk-test"))).unwrap();

        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        };
        let reply = client.complete(&request).await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content.as_deref(), Some("{\"episodes\": []}"));
    }

    #[tokio::test]
    async fn test_hanging_endpoint_times_out() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({"choices": []}))
            }),
        );
        let base_url = serve(app).await;
        let client = OpenAiChatClient::new(&PlannerConfig {
            timeout_secs: 1,
            ..config(&base_url, Some("sk-test"))
        })
        .unwrap();

        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        };
        let err = tokio::time::timeout(Duration::from_secs(10), client.complete(&request))
            .await
            .expect("complete should give up on its own")
            .unwrap_err();
        assert!(matches!(err, PlanError::ExternalCall(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_external_call() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base_url = serve(app).await;
        let client = OpenAiChatClient::new(&config(&base_url, Some("sk-bad"))).unwrap();

        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, PlanError::ExternalCall(ref msg) if msg.contains("401")));
    }
}
