//! Streamable HTTP transport: JSON-RPC 2.0 bodies posted to one endpoint.
//!
//! Every response is a plain `application/json` body; the server never opens
//! an SSE stream, so `GET` on the endpoint answers 405.

use crate::dispatch::ToolDispatcher;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use shared::protocol::{
    CallToolParams, CallToolResult, ListToolsResult, RpcRequest, RpcResponse, INVALID_PARAMS,
    INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
    SESSION_HEADER,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "cinechunks-tools";

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: ToolDispatcher,
}

/// Build the tool server router with the RPC endpoint mounted at `path`.
pub fn build_router(dispatcher: ToolDispatcher, path: &str) -> Router {
    let path = normalize_path(path);
    info!(path = %path, "Mounting tool endpoint");

    Router::new()
        .route(
            &path,
            post(handle_rpc).get(stream_not_supported).delete(end_session),
        )
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { dispatcher })
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn stream_not_supported() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn end_session() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Unparsable request body");
            return rpc_error(StatusCode::BAD_REQUEST, Value::Null, PARSE_ERROR, "Parse error");
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Invalid JSON-RPC request");
            return rpc_error(StatusCode::BAD_REQUEST, id, INVALID_REQUEST, "Invalid Request");
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return rpc_error(StatusCode::BAD_REQUEST, id, INVALID_REQUEST, "Invalid Request");
    }

    if request.is_notification() {
        debug!(method = %request.method, "Notification received");
        return StatusCode::ACCEPTED.into_response();
    }

    let id = request.id.clone().unwrap_or(Value::Null);
    debug!(method = %request.method, id = %id, "RPC request");

    match request.method.as_str() {
        "initialize" => initialize(id),
        "ping" => Json(RpcResponse::success(id, json!({}))).into_response(),
        "tools/list" => {
            let result = ListToolsResult {
                tools: state.dispatcher.descriptors(),
            };
            Json(RpcResponse::success(id, to_value(&result))).into_response()
        }
        "tools/call" => call_tool(&state, id, request.params).await,
        other => {
            warn!(method = %other, "Unknown method");
            rpc_error(
                StatusCode::OK,
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )
        }
    }
}

fn initialize(id: Value) -> Response {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session_id = %session_id, "Client session initialized");

    let result = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    });

    let mut response = Json(RpcResponse::success(id, result)).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn call_tool(state: &AppState, id: Value, params: Option<Value>) -> Response {
    let params: CallToolParams = match params.map(serde_json::from_value) {
        Some(Ok(params)) => params,
        Some(Err(e)) => {
            return rpc_error(StatusCode::OK, id, INVALID_PARAMS, format!("Invalid params: {}", e))
        }
        None => return rpc_error(StatusCode::OK, id, INVALID_PARAMS, "Missing params"),
    };

    let result = match state.dispatcher.invoke(&params.name, &params.arguments).await {
        Ok(result) => CallToolResult::text(
            result.payload.to_string(),
            Some(json!({ "result": result.payload })),
        ),
        Err(e) => {
            warn!(tool = %params.name, error = %e, "Tool call rejected");
            CallToolResult::error(e.to_string())
        }
    };

    Json(RpcResponse::success(id, to_value(&result))).into_response()
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn rpc_error(status: StatusCode, id: Value, code: i64, message: impl Into<String>) -> Response {
    (status, Json(RpcResponse::failure(id, code, message))).into_response()
}
