//! Client side of the tool server's Streamable HTTP transport.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use shared::protocol::{
    CallToolResult, ListToolsResult, RpcRequest, RpcResponse, PROTOCOL_VERSION, SESSION_HEADER,
};
use shared::PlanError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Source of tool definitions and executor of tool calls
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<shared::protocol::ToolDescriptor>, PlanError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, PlanError>;
}

/// MCP client for a remote tool server
///
/// The `initialize` handshake runs on first use and the session id the
/// server hands out is sent with every later request. A 404 for a request
/// carrying that id means the server dropped the session; the client then
/// runs the handshake again and retries the request once.
#[derive(Debug)]
pub struct McpToolClient {
    client: reqwest::Client,
    url: String,
    /// `None` until the handshake has run; the inner value is the session id
    session: Mutex<Option<Option<String>>>,
    next_id: AtomicU64,
}

/// Outcome of a single POST to the tool server
enum Exchange {
    Reply(Option<RpcResponse>, Option<String>),
    SessionExpired,
}

impl McpToolClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    async fn session(&self) -> Result<Option<String>, PlanError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }
        let session = self.initialize().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Forget `stale` so the next request runs the handshake again
    async fn reset_session(&self, stale: &str) {
        let mut slot = self.session.lock().await;
        if matches!(slot.as_ref(), Some(Some(current)) if current == stale) {
            *slot = None;
        }
    }

    async fn initialize(&self) -> Result<Option<String>, PlanError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "cinechunks-web", "version": env!("CARGO_PKG_VERSION") },
        });
        let (response, session) = self
            .post(&self.request("initialize", params), None)
            .await?
            .into_reply("initialize")?;
        let response = response.ok_or_else(|| {
            PlanError::ExternalCall("tool server sent no initialize response".to_string())
        })?;
        unwrap_result(response)?;

        self.post(
            &RpcRequest::notification("notifications/initialized"),
            session.as_deref(),
        )
        .await?
        .into_reply("notifications/initialized")?;

        info!(url = %self.url, session = ?session, "Connected to tool server");
        Ok(session)
    }

    fn request(&self, method: &str, params: Value) -> RpcRequest {
        RpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params)
    }

    /// POST one message; returns the decoded reply (if any) and the session header.
    async fn post(
        &self,
        message: &RpcRequest,
        session: Option<&str>,
    ) -> Result<Exchange, PlanError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }

        let response = builder.send().await.map_err(PlanError::external)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND && session.is_some() {
            return Ok(Exchange::SessionExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlanError::ExternalCall(format!(
                "tool server returned {} for {}: {}",
                status, message.method, body
            )));
        }

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);

        let body = response.text().await.map_err(PlanError::external)?;
        if message.is_notification() || body.trim().is_empty() {
            return Ok(Exchange::Reply(None, session_id));
        }

        let payload = if is_stream {
            last_event_data(&body).ok_or_else(|| {
                PlanError::ExternalCall("tool server stream carried no message".to_string())
            })?
        } else {
            body
        };

        let decoded: RpcResponse = serde_json::from_str(&payload).map_err(|e| {
            PlanError::ExternalCall(format!("invalid tool server response: {}", e))
        })?;
        Ok(Exchange::Reply(Some(decoded), session_id))
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, PlanError> {
        for attempt in 0..2 {
            let session = self.session().await?;
            debug!(method = %method, attempt = attempt + 1, "Tool server request");

            match self
                .post(&self.request(method, params.clone()), session.as_deref())
                .await?
            {
                Exchange::Reply(response, _) => {
                    let response = response.ok_or_else(|| {
                        PlanError::ExternalCall(format!("tool server sent no response to {}", method))
                    })?;
                    return unwrap_result(response);
                }
                Exchange::SessionExpired => {
                    warn!(method = %method, session = ?session, "Tool server session expired");
                    if let Some(stale) = session.as_deref() {
                        self.reset_session(stale).await;
                    }
                }
            }
        }

        Err(PlanError::ExternalCall(format!(
            "tool server session expired again during {}",
            method
        )))
    }
}

impl Exchange {
    fn into_reply(self, method: &str) -> Result<(Option<RpcResponse>, Option<String>), PlanError> {
        match self {
            Exchange::Reply(response, session) => Ok((response, session)),
            Exchange::SessionExpired => Err(PlanError::ExternalCall(format!(
                "tool server rejected a new session during {}",
                method
            ))),
        }
    }
}

fn unwrap_result(response: RpcResponse) -> Result<Value, PlanError> {
    if let Some(error) = response.error {
        return Err(PlanError::ExternalCall(format!(
            "tool server error {}: {}",
            error.code, error.message
        )));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Data of the last `data:` event in an SSE body
fn last_event_data(body: &str) -> Option<String> {
    let mut last = None;
    let mut current: Vec<&str> = Vec::new();

    for line in body.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !current.is_empty() {
                last = Some(current.join("\n"));
                current.clear();
            }
        } else if let Some(data) = line.strip_prefix("data:") {
            current.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }
    last
}

#[async_trait]
impl ToolInvoker for McpToolClient {
    async fn list_tools(&self) -> Result<Vec<shared::protocol::ToolDescriptor>, PlanError> {
        let result = self.rpc("tools/list", json!({})).await?;
        let list: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| PlanError::ExternalCall(format!("invalid tools/list result: {}", e)))?;
        Ok(list.tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, PlanError> {
        let result = self
            .rpc("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| PlanError::ExternalCall(format!("invalid tools/call result: {}", e)))
    }
}
