//! JSON-RPC 2.0 envelope for the tool-calling protocol
//!
//! The orchestrator speaks JSON-RPC 2.0 with a typed handshake. Requests
//! without an `id` are notifications and receive no response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version accepted by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error codes used by the tool servers
pub mod codes {
    /// Malformed JSON
    pub const PARSE_ERROR: i64 = -32700;
    /// Envelope invalid, or a method called before the handshake
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Parameters failed validation
    pub const INVALID_PARAMS: i64 = -32602;
    /// Handler failure
    pub const INTERNAL_ERROR: i64 = -32603;
    /// `tools/call` named an unknown tool
    pub const TOOL_NOT_FOUND: i64 = -32000;
    /// `resources/read` named an unknown URI
    pub const RESOURCE_NOT_FOUND: i64 = -32001;
    /// `initialize` with an unsupported protocol version
    pub const INITIALIZATION_FAILED: i64 = -32002;
}

/// Incoming JSON-RPC request
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Requests without an id are notifications
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outgoing JSON-RPC response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}
