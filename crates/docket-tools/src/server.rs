//! Tool-protocol server core
//!
//! [`ToolProvider`] is the seam a domain server implements; [`ToolSession`]
//! wraps a provider with the per-connection handshake state and dispatches
//! JSON-RPC methods. The handshake flag lives here — per connection, never
//! process-wide — so concurrent clients cannot corrupt each other.

use crate::protocol::{codes, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Static description of one callable tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Static description of one readable resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Server identity reported in the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Failure from a tool handler
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("tool not found: {name}")]
    NotFound { name: String },

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool {tool} failed: {reason}")]
    Internal { tool: String, reason: String },
}

impl ToolCallError {
    fn code(&self) -> i64 {
        match self {
            ToolCallError::NotFound { .. } => codes::TOOL_NOT_FOUND,
            ToolCallError::InvalidArguments { .. } => codes::INVALID_PARAMS,
            ToolCallError::Internal { .. } => codes::INTERNAL_ERROR,
        }
    }
}

/// A domain tool server: static catalogs plus dispatch
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Server identity for the handshake
    fn info(&self) -> ServerInfo;

    /// Tool catalog for `tools/list`
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Resource catalog for `resources/list`
    fn resources(&self) -> Vec<ResourceDescriptor>;

    /// Execute a named tool
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolCallError>;

    /// Fixed JSON document behind a resource URI
    fn read_resource(&self, uri: &str) -> Option<Value>;
}

#[derive(Debug, Deserialize)]
struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    protocol_version: Option<String>,
    #[serde(rename = "clientInfo", default)]
    client_info: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// One client connection to a tool server
///
/// Holds the only piece of cross-call state the protocol has: whether this
/// connection has completed the handshake.
pub struct ToolSession {
    provider: Arc<dyn ToolProvider>,
    initialized: bool,
}

impl ToolSession {
    /// Open a session against a provider
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider,
            initialized: false,
        }
    }

    /// Whether this connection has completed the handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handle one request; `None` for notifications
    pub async fn handle(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                codes::INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        if request.is_notification() {
            debug!(method = %request.method, "notification received");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        if request.method == "initialize" {
            return Some(self.handle_initialize(id, request.params));
        }

        if !self.initialized {
            return Some(JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                "handshake not complete: call initialize first",
            ));
        }

        let response = match request.method.as_str() {
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(
                id,
                json!({ "tools": self.provider.tools() }),
            ),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => JsonRpcResponse::success(
                id,
                json!({ "resources": self.provider.resources() }),
            ),
            "resources/read" => self.handle_resources_read(id, request.params),
            _ => JsonRpcResponse::error(id, codes::METHOD_NOT_FOUND, "method not found"),
        };

        Some(response)
    }

    fn handle_initialize(&mut self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: InitializeParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid params: {err}"),
                );
            }
        };

        let requested = parsed.protocol_version.as_deref().unwrap_or_default();
        if requested != PROTOCOL_VERSION {
            return JsonRpcResponse::error(
                id,
                codes::INITIALIZATION_FAILED,
                format!(
                    "unsupported protocol version {:?}, server speaks {}",
                    requested, PROTOCOL_VERSION
                ),
            );
        }

        // A duplicate handshake from the same connection is a success, not
        // an error: orchestrator retries must be tolerated.
        if self.initialized {
            debug!(client = ?parsed.client_info, "duplicate initialize treated as success");
        }
        self.initialized = true;

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": self.provider.info(),
                "capabilities": {
                    "tools": { "listChanged": false },
                    "resources": { "subscribe": false, "listChanged": false }
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid params: {err}"),
                );
            }
        };

        let known = self.provider.tools().iter().any(|t| t.name == parsed.name);
        if !known {
            return JsonRpcResponse::error(
                id,
                codes::TOOL_NOT_FOUND,
                format!("tool not found: {}", parsed.name),
            );
        }

        match self.provider.call_tool(&parsed.name, parsed.arguments).await {
            Ok(result) => {
                let text = result.to_string();
                JsonRpcResponse::success(
                    id,
                    json!({
                        "structuredContent": result,
                        "content": [{
                            "type": "text",
                            "text": text,
                        }]
                    }),
                )
            }
            Err(err) => JsonRpcResponse::error(id, err.code(), err.to_string()),
        }
    }

    fn handle_resources_read(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ResourceReadParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("invalid params: {err}"),
                );
            }
        };

        let Some(document) = self.provider.read_resource(&parsed.uri) else {
            return JsonRpcResponse::error(
                id,
                codes::RESOURCE_NOT_FOUND,
                format!("resource not found: {}", parsed.uri),
            );
        };

        JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": parsed.uri,
                    "mimeType": "application/json",
                    "text": document.to_string(),
                }]
            }),
        )
    }
}
